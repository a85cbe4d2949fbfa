//! Smart Task Planner.
//!
//! The pieces fit together as: presentation drives the [`session`]
//! controller, which talks to the REST backend ([`api`], served over
//! [`planner_core`]'s database) through a chat-store client and to the
//! generative AI service through the [`ai`] collaborator client. Generated
//! plans can be rendered to PDF via [`pdf`].

pub mod ai;
pub mod api;
pub mod pdf;
pub mod session;
