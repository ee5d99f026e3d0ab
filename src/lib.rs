//! Chronos Engine: a branching interactive-fiction interpreter.
//!
//! Stories are authored as chapters of scenes. Each scene carries text
//! variants keyed by conditions on the player's profile, and may end in a
//! free-text prompt or a stat-gated choice. The interpreter walks the story,
//! reveals text progressively into an [`core::output::OutputSink`], autosaves
//! every scene, and keeps a bounded rollback history.
//!
//! ```no_run
//! use chronos_engine::core::interpreter::Interpreter;
//! use chronos_engine::core::output::Transcript;
//! use chronos_engine::schema::profile::Profile;
//! use chronos_engine::schema::session::{Mode, Session};
//!
//! let mut sink = Transcript::new();
//! let mut interp = Interpreter::builder()
//!     .story_file("story_data/chronos/story.ron")
//!     .backgrounds_file("story_data/chronos/backgrounds.ron")
//!     .build(&mut sink)?;
//! let session = Session::new(Mode::Solo, Profile::new("Ava"), Profile::auto_partner());
//! interp.start(session, &mut sink)?;
//! interp.advance(&mut sink)?;
//! # Ok::<(), chronos_engine::core::interpreter::InterpreterError>(())
//! ```

pub mod core;
pub mod schema;
