use std::sync::Arc;

use sheetmerge_model::Workbook;
use sheetmerge_xlsx::{load_from_bytes, WorkbookKind};

use crate::error::{ComposeError, SourceRole};
use crate::report::SkipReason;

/// The template package. Clones share one immutable buffer, so concurrent
/// compositions never copy or mutate it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    bytes: Arc<[u8]>,
}

impl Template {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Raw input packages for one composition.
#[derive(Clone, Copy, Debug)]
pub struct ComposeInputs<'a> {
    pub template: &'a Template,
    pub primary: &'a [u8],
    pub secondary: Option<&'a [u8]>,
}

/// Load state of the optional input.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionalSource {
    Loaded(Workbook),
    Absent,
    Unreadable(String),
}

/// Decoded inputs. The required workbooks are always present.
#[derive(Clone, Debug, PartialEq)]
pub struct Sources {
    template: Workbook,
    template_kind: WorkbookKind,
    primary: Workbook,
    secondary: OptionalSource,
}

impl Sources {
    pub fn new(
        template: Workbook,
        template_kind: WorkbookKind,
        primary: Workbook,
        secondary: OptionalSource,
    ) -> Self {
        Self {
            template,
            template_kind,
            primary,
            secondary,
        }
    }

    /// Decode every input. A malformed template or primary package is fatal; a
    /// malformed secondary package is kept as [`OptionalSource::Unreadable`].
    pub fn load(inputs: &ComposeInputs<'_>) -> Result<Self, ComposeError> {
        let template = load_from_bytes(inputs.template.bytes())
            .map_err(|err| ComposeError::parse(SourceRole::Template, err))?;
        let primary = load_from_bytes(inputs.primary)
            .map_err(|err| ComposeError::parse(SourceRole::Primary, err))?;
        let secondary = match inputs.secondary.map(load_from_bytes) {
            None => OptionalSource::Absent,
            Some(Ok(doc)) => OptionalSource::Loaded(doc.workbook),
            Some(Err(err)) => {
                log::warn!("ignoring unreadable {} workbook: {err}", SourceRole::Secondary);
                OptionalSource::Unreadable(err.to_string())
            }
        };
        Ok(Self::new(
            template.workbook,
            template.kind,
            primary.workbook,
            secondary,
        ))
    }

    pub fn template_kind(&self) -> WorkbookKind {
        self.template_kind
    }

    pub fn template(&self) -> &Workbook {
        &self.template
    }

    pub fn workbook(&self, role: SourceRole) -> Option<&Workbook> {
        self.availability(role).ok()
    }

    /// The workbook playing `role`, or why it cannot be used.
    pub fn availability(&self, role: SourceRole) -> Result<&Workbook, SkipReason> {
        match role {
            SourceRole::Template => Ok(&self.template),
            SourceRole::Primary => Ok(&self.primary),
            SourceRole::Secondary => match &self.secondary {
                OptionalSource::Loaded(workbook) => Ok(workbook),
                OptionalSource::Absent => Err(SkipReason::SourceAbsent),
                OptionalSource::Unreadable(message) => Err(SkipReason::SourceUnreadable {
                    message: message.clone(),
                }),
            },
        }
    }
}
