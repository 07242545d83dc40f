pub mod health;
pub mod plagiarism;
