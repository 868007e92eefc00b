pub mod importer;
pub mod rows;
pub mod workbook;
