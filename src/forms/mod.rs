pub mod post;
pub mod register;

pub use post::PostForm;
pub use register::RegisterForm;
