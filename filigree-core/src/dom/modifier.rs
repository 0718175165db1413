//! Style modifiers.
//!
//! A modifier is a typed bundle of inline style declarations attached to an
//! element. Modifiers are applied in declaration order after the element's
//! static props, so a later modifier overrides a property set by an earlier
//! one.

use smallvec::SmallVec;

/// Declarations produced by a modifier, in application order.
pub type Declarations = SmallVec<[(&'static str, String); 4]>;

/// Colors, borders and opacity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Appearance {
    pub color: Option<String>,
    pub background: Option<String>,
    pub border: Option<String>,
    pub corner_radius: Option<String>,
    pub opacity: Option<f32>,
}

/// Font and text settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Typography {
    pub font_family: Option<String>,
    pub font_size: Option<String>,
    pub font_weight: Option<u16>,
    pub line_height: Option<String>,
    pub text_align: Option<String>,
    pub color: Option<String>,
}

/// Box model and sizing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub display: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub padding: Option<String>,
    pub margin: Option<String>,
    pub gap: Option<String>,
}

/// Pointer and selection behavior.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interaction {
    pub cursor: Option<String>,
    pub pointer_events: Option<String>,
    pub user_select: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Appearance,
    Typography,
    Layout,
    Interaction,
}

/// A typed style modifier.
///
/// ```rust
/// use filigree_core::dom::{Appearance, Modifier};
///
/// let tint = Modifier::Appearance(Appearance {
///     color: Some("crimson".into()),
///     ..Appearance::default()
/// });
/// assert!(tint.sets_color());
/// assert_eq!(tint.declarations()[0], ("color", "crimson".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Appearance(Appearance),
    Typography(Typography),
    Layout(Layout),
    Interaction(Interaction),
}

impl Modifier {
    pub fn kind(&self) -> ModifierKind {
        match self {
            Self::Appearance(_) => ModifierKind::Appearance,
            Self::Typography(_) => ModifierKind::Typography,
            Self::Layout(_) => ModifierKind::Layout,
            Self::Interaction(_) => ModifierKind::Interaction,
        }
    }

    /// Whether this modifier sets a foreground or background color.
    pub fn sets_color(&self) -> bool {
        match self {
            Self::Appearance(appearance) => {
                appearance.color.is_some() || appearance.background.is_some()
            }
            Self::Typography(typography) => typography.color.is_some(),
            Self::Layout(_) | Self::Interaction(_) => false,
        }
    }

    /// The inline style declarations this modifier applies.
    pub fn declarations(&self) -> Declarations {
        let mut out = Declarations::new();
        let mut push = |property: &'static str, value: &Option<String>| {
            if let Some(value) = value {
                out.push((property, value.clone()));
            }
        };

        match self {
            Self::Appearance(appearance) => {
                push("color", &appearance.color);
                push("background", &appearance.background);
                push("border", &appearance.border);
                push("border-radius", &appearance.corner_radius);
                push("opacity", &appearance.opacity.map(|opacity| opacity.to_string()));
            }
            Self::Typography(typography) => {
                push("font-family", &typography.font_family);
                push("font-size", &typography.font_size);
                push(
                    "font-weight",
                    &typography.font_weight.map(|weight| weight.to_string()),
                );
                push("line-height", &typography.line_height);
                push("text-align", &typography.text_align);
                push("color", &typography.color);
            }
            Self::Layout(layout) => {
                push("display", &layout.display);
                push("width", &layout.width);
                push("height", &layout.height);
                push("padding", &layout.padding);
                push("margin", &layout.margin);
                push("gap", &layout.gap);
            }
            Self::Interaction(interaction) => {
                push("cursor", &interaction.cursor);
                push("pointer-events", &interaction.pointer_events);
                push("user-select", &interaction.user_select);
            }
        }
        out
    }
}

/// Whether any modifier in `modifiers` sets a color.
pub fn has_color_modifier(modifiers: &[Modifier]) -> bool {
    modifiers.iter().fold(false, |found, modifier| found || modifier.sets_color())
}
