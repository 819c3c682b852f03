mod controller;
mod driver;
mod state;

pub use controller::{Applied, FetchTicket, FetchedRows, Notice, ViewController, fetch_rows};
pub use driver::drive;
pub use state::{ViewEvent, ViewState};
