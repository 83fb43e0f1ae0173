pub mod bar;
pub mod loader;
pub mod series;

pub use bar::ContractBar;
pub use loader::{load_contract_csv, load_continuous_dir, load_frame_csv, load_product_dir};
pub use series::{rolling_mean, ContractSeries, ProductContractSet};
