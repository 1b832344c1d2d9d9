mod certificates;
mod store;
