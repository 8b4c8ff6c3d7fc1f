pub mod id;
pub mod object;
pub mod commit;
pub mod tree;
pub mod repository;
pub mod history;
