pub mod credentials;
pub mod jobs;
pub mod settings;
