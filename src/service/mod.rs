pub mod plagiarism;
pub mod staging;
