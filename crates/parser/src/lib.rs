pub mod email;
pub mod html;
pub mod phone;

pub use email::EmailExtractor;
pub use html::{parse_page, ParsedPage};
pub use phone::PhoneExtractor;
