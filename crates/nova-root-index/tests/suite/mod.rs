mod support;

mod invalidation;
mod local_fs;
mod order_entries;
mod packages;
