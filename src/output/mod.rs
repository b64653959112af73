pub mod chart;
pub mod csv;
pub mod json;
pub mod table;
