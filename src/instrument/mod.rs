pub mod contract_code;

pub use contract_code::{month_diff, CodeError, ContractCode, DeliveryMonth};
