pub mod inspect;
pub mod register;
