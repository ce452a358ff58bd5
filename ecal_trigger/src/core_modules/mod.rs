pub mod module;
pub mod layout_reader;
pub mod node_grid;
pub mod logic_cluster;
pub mod cluster_builder;
pub mod colorizer;
pub mod outline;
pub mod report;

#[cfg(test)]
pub(crate) mod test_support;
