//! Pagemark Core Library
//!
//! Page store, annotation model, coordinate mapping and the export pipeline
//! for the Pagemark PDF editor.
//!
//! An [`EditorSession`] owns one open document. It maps pointer input into
//! canonical page space, keeps per-page annotation history, drives page
//! rasterization through a cooperative render queue, and flattens annotated
//! pages into a new PDF on export.
//!
//! ```no_run
//! use pagemark_core::{EditorConfig, EditorSession, PointerEvent, Tool};
//! use pagemark_scheduler::DrainAll;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = pdf_engine::system_engine();
//! let mut session =
//!     EditorSession::open(engine, std::path::Path::new("report.pdf"), EditorConfig::default())?;
//! session.set_viewport(918.0, 1188.0);
//! session.pump_renders(DrainAll);
//!
//! session.set_tool(Tool::Rectangle);
//! session.handle_pointer(PointerEvent::down(10.0, 10.0));
//! session.handle_pointer(PointerEvent::up(50.0, 50.0));
//!
//! let output = session.export_all()?;
//! std::fs::write("report-annotated.pdf", output.bytes.as_slice())?;
//! # Ok(())
//! # }
//! ```

pub mod annotation;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod font;
pub mod history;
pub mod input;
pub mod interaction;
pub mod page;
pub mod paint;
pub mod persistence;
pub mod render;
pub mod save;
pub mod session;
pub mod surface;
pub mod text_entry;
pub mod text_layout;
pub mod tool;
pub mod transform;
pub mod view;

#[cfg(test)]
mod test_support;

pub use annotation::{Annotation, AnnotationKind, Color, ParseColorError, Point, Rect};
pub use config::{ConfigError, EditorConfig};
pub use document::Document;
pub use error::{EditorError, EditorResult};
pub use export::{ExportContext, ExportJob, ExportOutput, ExportStep};
pub use font::{FontError, FontFace};
pub use history::{History, DEFAULT_UNDO_DEPTH};
pub use input::{Key, KeyEvent, Modifiers, PointerEvent, PointerKind};
pub use interaction::{Interaction, InteractionState};
pub use page::{Page, PageStatus, PageStore};
pub use paint::{PaintStyle, Painter};
pub use persistence::{AnnotationSet, PersistenceError};
pub use render::{PassState, RenderContext, RenderPass, RenderScheduler};
pub use save::{MemorySaveChannel, SaveChannel, SaveOutcome};
pub use session::EditorSession;
pub use surface::{ImageEncoding, RasterSurface, SurfaceError};
pub use text_entry::{TextCommit, TextEntry};
pub use text_layout::{ApproxMeasure, TextLayout, TextMeasure};
pub use tool::{Tool, ToolSettings};
pub use transform::{DisplayTransform, Size};
pub use view::ViewState;
