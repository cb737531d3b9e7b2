pub mod ordered_float;
