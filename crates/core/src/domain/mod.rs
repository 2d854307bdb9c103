pub mod contact;
pub mod lead;
pub mod operator;
pub mod source;
