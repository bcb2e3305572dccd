pub mod code;
pub mod content;
pub mod drupal;
pub mod github;
pub mod traits;

#[cfg(test)]
pub mod fakes;
