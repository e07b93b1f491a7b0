pub mod genre;
pub mod media;
pub mod rating;
pub mod user;

pub use genre::Genre;
pub use media::Media;
pub use rating::Rating;
pub use user::User;
