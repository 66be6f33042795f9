pub mod dchart;
pub mod generation_provider;
pub mod history_provider;
pub mod quote_page;
pub mod ssi;
pub mod vndirect_index;
pub mod yahoofinance;
