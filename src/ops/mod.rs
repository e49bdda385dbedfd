pub mod shapes;
pub mod text;
pub mod transform;
