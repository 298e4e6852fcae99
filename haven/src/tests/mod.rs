mod bucket;
mod network;
mod registry;
mod utils;
