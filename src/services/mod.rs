pub mod converter;
pub mod excel;
pub mod mailer;
pub mod stats;
