use glam::{DMat4, DVec3};

use crate::{
    error::{Error, Result},
    math,
};

use super::xml::Element;

/// The elements that make up a node's transform list.
pub const TRANSFORM_ELEMENTS: &[&str] = &["lookat", "matrix", "rotate", "scale", "skew", "translate"];

/// A single transform operation of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformKind {
    Translate(DVec3),
    /// A rotation about an axis, by an angle in degrees.
    Rotate(DVec3, f64),
    Scale(DVec3),
    Matrix(DMat4),
    /// `lookat` and `skew` are written back untouched and do not contribute to the local matrix.
    Passthrough(Element),
}

/// A transform element (`<translate>`, `<rotate>`, ...) of a `<node>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The scoped identifier animations use to target the transform.
    pub sid: Option<String>,
    pub kind: TransformKind,
}

impl Transform {
    pub fn translate(translation: DVec3) -> Self {
        Self {
            sid: None,
            kind: TransformKind::Translate(translation),
        }
    }

    pub fn rotate(axis: DVec3, degrees: f64) -> Self {
        Self {
            sid: None,
            kind: TransformKind::Rotate(axis, degrees),
        }
    }

    pub fn is_transform(name: &str) -> bool {
        TRANSFORM_ELEMENTS.contains(&name)
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let values = |count: usize| {
            let text = element.text();
            parse_floats(&text)
                .filter(|values| values.len() == count)
                .ok_or_else(|| Error::InvalidTransform {
                    element: element.name.clone(),
                    text: text.trim().to_string(),
                })
        };

        let kind = match element.name.as_str() {
            "translate" => TransformKind::Translate(DVec3::from_slice(&values(3)?)),
            "rotate" => {
                let values = values(4)?;
                TransformKind::Rotate(DVec3::from_slice(&values), values[3])
            }
            "scale" => TransformKind::Scale(DVec3::from_slice(&values(3)?)),
            // COLLADA stores matrices row by row.
            "matrix" => {
                let values = values(16)?;
                TransformKind::Matrix(DMat4::from_cols_slice(&values).transpose())
            }
            _ => TransformKind::Passthrough(element.clone()),
        };

        Ok(Self {
            sid: element.attribute("sid").map(str::to_string),
            kind,
        })
    }

    pub fn to_element(&self) -> Element {
        let mut element = match &self.kind {
            TransformKind::Translate(translation) => {
                Element::with_text("translate", format_floats(&translation.to_array()))
            }
            TransformKind::Rotate(axis, degrees) => Element::with_text(
                "rotate",
                format_floats(&[axis.x, axis.y, axis.z, *degrees]),
            ),
            TransformKind::Scale(scale) => {
                Element::with_text("scale", format_floats(&scale.to_array()))
            }
            TransformKind::Matrix(matrix) => Element::with_text(
                "matrix",
                format_floats(&matrix.transpose().to_cols_array()),
            ),
            TransformKind::Passthrough(element) => return element.clone(),
        };
        if let Some(sid) = &self.sid {
            element.set_attribute("sid", sid.as_str());
        }

        element
    }

    pub fn matrix(&self) -> DMat4 {
        match &self.kind {
            TransformKind::Translate(translation) => DMat4::from_translation(*translation),
            TransformKind::Rotate(axis, degrees) => {
                DMat4::from_mat3(math::from_axis_angle(*axis, *degrees))
            }
            TransformKind::Scale(scale) => DMat4::from_scale(*scale),
            TransformKind::Matrix(matrix) => *matrix,
            TransformKind::Passthrough(_) => DMat4::IDENTITY,
        }
    }
}

/// Composes a transform list into a local matrix. The first transform is the outermost.
pub fn compose(transforms: &[Transform]) -> DMat4 {
    transforms
        .iter()
        .fold(DMat4::IDENTITY, |matrix, transform| matrix * transform.matrix())
}

pub fn parse_floats(text: &str) -> Option<Vec<f64>> {
    text.split_whitespace()
        .map(|value| value.parse().ok())
        .collect()
}

/// Formats values separated by single spaces. Values within rounding noise of an integer are
/// written as that integer, and negative zero as `0`.
pub fn format_floats(values: &[f64]) -> String {
    values
        .iter()
        .map(|&value| snap(value).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

const SNAP_TOLERANCE: f64 = 1e-12;

fn snap(value: f64) -> f64 {
    let rounded = value.round();
    let value = if (value - rounded).abs() <= SNAP_TOLERANCE * rounded.abs().max(1.) {
        rounded
    } else {
        value
    };

    // Adding zero turns -0.0 into 0.0.
    value + 0.
}
