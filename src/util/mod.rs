pub mod digest;
pub mod extract;
pub mod shingle;
pub mod similarity;
