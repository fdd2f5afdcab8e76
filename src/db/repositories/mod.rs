pub mod notification_repository;
pub mod period_repository;
pub mod quiz_repository;
pub mod section_repository;
pub mod user_repository;
pub mod vote_repository;
