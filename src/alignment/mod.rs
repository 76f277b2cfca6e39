pub mod highlight;
pub mod matcher;
pub mod report;
pub mod seeker;
pub mod similarity;
pub mod tokenization;
pub mod transcript;
