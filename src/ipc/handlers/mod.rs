pub mod analytics;
pub mod assignments;
pub mod attendance;
pub mod auth;
pub mod classes;
pub mod classroom;
pub mod core;
pub mod generate;
pub mod grades;
pub mod meetings;
pub mod messaging;
pub mod proctoring;
pub mod resources;
pub mod students;
