pub mod stats;
pub mod work_item;
