pub mod normalize;
pub mod reader;

pub use reader::load_sheet_rows;
