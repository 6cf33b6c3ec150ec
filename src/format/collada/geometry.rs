use glam::DVec3;

use crate::error::{Error, Result};

use super::{
    transform::{format_floats, parse_floats},
    xml::Element,
};

/// The element names of the primitives a `<mesh>` may hold.
pub const PRIMITIVE_ELEMENTS: &[&str] = &[
    "lines",
    "linestrips",
    "polygons",
    "polylist",
    "triangles",
    "trifans",
    "tristrips",
];

pub const POLYLIST: &str = "polylist";

/// An `<input>` of a primitive or of the `<vertices>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub semantic: String,
    /// The referenced id, without the leading `#`.
    pub source: String,
}

impl Input {
    fn from_element(element: &Element) -> Option<Self> {
        Some(Self {
            semantic: element.attribute("semantic")?.to_string(),
            source: strip_fragment(element.attribute("source")?).to_string(),
        })
    }
}

/// A primitive of a geometry's mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    /// The element name, e.g. `polylist`.
    pub kind: String,
    /// The position of the primitive among the mesh's primitives.
    pub index: usize,
    pub inputs: Vec<Input>,
}

impl Primitive {
    pub fn input(&self, semantic: &str) -> Option<&Input> {
        self.inputs.iter().find(|input| input.semantic == semantic)
    }

    pub fn is_polylist(&self) -> bool {
        self.kind == POLYLIST
    }
}

/// The data sources backing a primitive's positions and normals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveSources {
    pub positions: String,
    pub normals: Option<String>,
}

/// Lists the primitives of a `<mesh>` element in document order.
pub fn primitives(mesh: &Element) -> Vec<Primitive> {
    mesh.elements()
        .map(|(_, element)| element)
        .filter(|element| PRIMITIVE_ELEMENTS.contains(&element.name.as_str()))
        .enumerate()
        .map(|(index, element)| Primitive {
            kind: element.name.clone(),
            index,
            inputs: inputs(element),
        })
        .collect()
}

/// Resolves a primitive's `VERTEX` input through the mesh's `<vertices>` element.
///
/// A `NORMAL` input on the primitive itself takes precedence over one declared in `<vertices>`.
pub fn resolve_sources(
    mesh: &Element,
    geometry: &str,
    primitive: &Primitive,
) -> Result<PrimitiveSources> {
    let missing = |semantic| Error::MissingInput {
        geometry: geometry.to_string(),
        kind: primitive.kind.clone(),
        index: primitive.index,
        semantic,
    };

    let vertex = primitive.input("VERTEX").ok_or_else(|| missing("VERTEX"))?;
    let vertices = mesh
        .children_named("vertices")
        .find(|vertices| vertices.attribute("id") == Some(vertex.source.as_str()))
        .ok_or_else(|| Error::UnresolvedReference {
            kind: "vertices",
            id: vertex.source.clone(),
        })?;
    let vertex_inputs = inputs(vertices);

    let positions = vertex_inputs
        .iter()
        .find(|input| input.semantic == "POSITION")
        .ok_or_else(|| missing("POSITION"))?
        .source
        .clone();
    let normals = primitive
        .input("NORMAL")
        .or_else(|| {
            vertex_inputs
                .iter()
                .find(|input| input.semantic == "NORMAL")
        })
        .map(|input| input.source.clone());

    Ok(PrimitiveSources { positions, normals })
}

fn inputs(element: &Element) -> Vec<Input> {
    element
        .children_named("input")
        .filter_map(Input::from_element)
        .collect()
}

/// Reads the 3-vectors of a `<source>` element.
pub fn read_vectors(source: &Element) -> Result<Vec<DVec3>> {
    let (values, stride) = read_floats(source)?;

    Ok(values
        .chunks_exact(stride)
        .map(DVec3::from_slice)
        .collect())
}

/// Overwrites the first three components of every element of a `<source>`.
pub fn write_vectors(source: &mut Element, vectors: &[DVec3]) -> Result<()> {
    let (mut values, stride) = read_floats(source)?;
    let id = source_id(source);
    if values.len() / stride != vectors.len() {
        return Err(Error::InvalidSource {
            id,
            message: format!(
                "expected {} vectors, got {}",
                values.len() / stride,
                vectors.len()
            ),
        });
    }

    for (chunk, vector) in values.chunks_exact_mut(stride).zip(vectors) {
        chunk[..3].copy_from_slice(&vector.to_array());
    }

    let index = source
        .elements()
        .find(|(_, element)| element.name == "float_array")
        .map(|(index, _)| index);
    let array = index
        .and_then(|index| source.descendant_mut(&[index]))
        .ok_or_else(|| invalid_source(&id, "no <float_array>"))?;
    array.set_text(format_floats(&values));

    Ok(())
}

fn read_floats(source: &Element) -> Result<(Vec<f64>, usize)> {
    let id = source_id(source);
    let array = source
        .child("float_array")
        .ok_or_else(|| invalid_source(&id, "no <float_array>"))?;
    let values =
        parse_floats(&array.text()).ok_or_else(|| invalid_source(&id, "non-numeric value"))?;

    let stride = match source
        .child("technique_common")
        .and_then(|technique| technique.child("accessor"))
        .and_then(|accessor| accessor.attribute("stride"))
    {
        Some(stride) => stride
            .trim()
            .parse::<usize>()
            .map_err(|_| invalid_source(&id, "invalid accessor stride"))?,
        None => 3,
    };
    if stride < 3 {
        return Err(invalid_source(&id, "accessor stride is below 3"));
    }
    if values.len() % stride != 0 {
        return Err(invalid_source(
            &id,
            "float count is not a multiple of the accessor stride",
        ));
    }

    Ok((values, stride))
}

fn source_id(source: &Element) -> String {
    source.attribute("id").unwrap_or_default().to_string()
}

fn invalid_source(id: &str, message: &str) -> Error {
    Error::InvalidSource {
        id: id.to_string(),
        message: message.to_string(),
    }
}

/// Strips the leading `#` of a local URL.
pub fn strip_fragment(url: &str) -> &str {
    url.strip_prefix('#').unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::format::collada::xml::XmlDocument;

    use super::*;

    const MESH: &str = r##"<mesh>
	<source id="positions">
		<float_array id="positions-array" count="8">0 1 0 9 0 0 1 9</float_array>
		<technique_common>
			<accessor source="#positions-array" count="2" stride="4"/>
		</technique_common>
	</source>
	<source id="normals">
		<float_array id="normals-array" count="3">0 1 0</float_array>
	</source>
	<vertices id="vertices">
		<input semantic="POSITION" source="#positions"/>
		<input semantic="NORMAL" source="#normals"/>
	</vertices>
	<polylist count="1">
		<input semantic="VERTEX" source="#vertices" offset="0"/>
	</polylist>
	<triangles count="1">
		<input semantic="VERTEX" source="#vertices" offset="0"/>
		<input semantic="NORMAL" source="#other-normals" offset="1"/>
	</triangles>
	<polylist count="1">
		<input semantic="TEXCOORD" source="#uv" offset="0"/>
	</polylist>
</mesh>"##;

    fn mesh() -> Element {
        XmlDocument::parse(MESH).unwrap().root
    }

    #[test]
    fn primitives_in_order() {
        let primitives = primitives(&mesh());

        assert_eq!(
            vec![
                (String::from("polylist"), 0),
                (String::from("triangles"), 1),
                (String::from("polylist"), 2),
            ],
            primitives
                .iter()
                .map(|p| (p.kind.clone(), p.index))
                .collect::<Vec<_>>()
        );
        assert!(primitives[0].is_polylist());
        assert!(!primitives[1].is_polylist());
    }

    #[test]
    fn sources_resolve_through_vertices() {
        let mesh = mesh();
        let primitives = primitives(&mesh);

        assert_eq!(
            PrimitiveSources {
                positions: String::from("positions"),
                normals: Some(String::from("normals")),
            },
            resolve_sources(&mesh, "geometry", &primitives[0]).unwrap()
        );
        assert_eq!(
            Some(String::from("other-normals")),
            resolve_sources(&mesh, "geometry", &primitives[1])
                .unwrap()
                .normals
        );
        assert!(matches!(
            resolve_sources(&mesh, "geometry", &primitives[2]),
            Err(Error::MissingInput {
                semantic: "VERTEX",
                ..
            })
        ));
    }

    #[test]
    fn vectors_respect_the_stride() {
        let mut mesh = mesh();
        let path = mesh.find_id("positions").unwrap();
        let source = mesh.descendant_mut(&path).unwrap();

        assert_eq!(vec![DVec3::Y, DVec3::Z], read_vectors(source).unwrap());

        write_vectors(source, &[DVec3::Z, -DVec3::Y]).unwrap();

        assert_eq!(
            "0 0 1 9 0 -1 0 9",
            source.child("float_array").unwrap().text()
        );
    }

    #[test]
    fn vector_count_must_match() {
        let mut mesh = mesh();
        let path = mesh.find_id("normals").unwrap();
        let source = mesh.descendant_mut(&path).unwrap();

        assert!(write_vectors(source, &[DVec3::X, DVec3::Y]).is_err());
    }
}
