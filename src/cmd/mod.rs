//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                              |
//! |-----------|---------------------------------------------------------------|
//! | `board`   | `Login`, `Boards`, `Show`, `AddColumn`, `AddTask`,            |
//! |           | `RenameColumn`, `MoveColumn`, `MoveTask`                      |
//! | `watch`   | `Watch`                                                       |
//! | `config`  | `Config`                                                      |

pub mod board;
pub mod config;
pub mod watch;

pub use board::{
    cmd_add_column, cmd_add_task, cmd_boards, cmd_login, cmd_move_column, cmd_move_task,
    cmd_rename_column, cmd_show,
};
pub use config::cmd_config;
pub use watch::cmd_watch;
