pub mod describe;
pub mod pi;
