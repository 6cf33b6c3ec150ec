//! An editable COLLADA document: the scene graph, transform lists, skin bindings and the
//! geometry data sources the correction engine touches.

use std::str::FromStr;

use glam::{DMat4, DVec3};

use crate::error::{Error, Result};

mod geometry;
mod transform;
pub mod xml;

pub use geometry::{Input, Primitive, PrimitiveSources, PRIMITIVE_ELEMENTS};
pub use transform::{compose, Transform, TransformKind, TRANSFORM_ELEMENTS};

use self::xml::{Element, XmlDocument, XmlNode};

/// The location of an element as a path of child indices from the `<COLLADA>` root.
pub type ElementPath = Vec<usize>;

pub const NODE: &str = "node";
pub const INSTANCE_CONTROLLER: &str = "instance_controller";

#[derive(Debug, Clone, PartialEq)]
pub struct Collada {
    document: XmlDocument,
}

impl FromStr for Collada {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let document = XmlDocument::parse(text)?;
        if document.root.name != "COLLADA" {
            return Err(Error::NotCollada(document.root.name));
        }

        Ok(Self { document })
    }
}

impl Collada {
    pub fn to_string(&self) -> Result<String> {
        self.document.write()
    }

    pub fn root(&self) -> &Element {
        &self.document.root
    }

    pub fn element(&self, path: &[usize]) -> Result<&Element> {
        self.document
            .root
            .descendant(path)
            .ok_or_else(|| Error::InvalidPath(path.to_vec()))
    }

    pub fn element_mut(&mut self, path: &[usize]) -> Result<&mut Element> {
        self.document
            .root
            .descendant_mut(path)
            .ok_or_else(|| Error::InvalidPath(path.to_vec()))
    }

    /// Finds the element of the given name with the given `id`.
    fn lookup(&self, kind: &'static str, name: &str, id: &str) -> Result<ElementPath> {
        self.document
            .root
            .find_named_id(name, id)
            .ok_or_else(|| Error::UnresolvedReference {
                kind,
                id: id.to_string(),
            })
    }

    /// The visual scene that `<scene>` instantiates, or the first one if there is no `<scene>`.
    pub fn visual_scene(&self) -> Result<ElementPath> {
        let root = &self.document.root;
        let url = root
            .child("scene")
            .and_then(|scene| scene.child("instance_visual_scene"))
            .and_then(|instance| instance.attribute("url"));
        if let Some(url) = url {
            return self.lookup("visual scene", "visual_scene", geometry::strip_fragment(url));
        }

        root.elements()
            .filter(|(_, library)| library.name == "library_visual_scenes")
            .find_map(|(index, library)| {
                library
                    .elements()
                    .find(|(_, scene)| scene.name == "visual_scene")
                    .map(|(scene, _)| vec![index, scene])
            })
            .ok_or(Error::MissingVisualScene)
    }

    /// The top-level nodes of the instantiated visual scene.
    pub fn scene_roots(&self) -> Result<Vec<ElementPath>> {
        let scene = self.visual_scene()?;
        self.scene_children(&scene)
    }

    /// The nodes and instance elements directly below a scene item.
    pub fn scene_children(&self, path: &[usize]) -> Result<Vec<ElementPath>> {
        Ok(self
            .element(path)?
            .elements()
            .filter(|(_, child)| child.name == NODE || child.name.starts_with("instance_"))
            .map(|(index, _)| {
                let mut child = path.to_vec();
                child.push(index);
                child
            })
            .collect())
    }

    /// The local matrix of a scene item. Only `<node>` elements have one.
    pub fn local_matrix(&self, path: &[usize]) -> Result<Option<DMat4>> {
        if self.element(path)?.name != NODE {
            return Ok(None);
        }

        Ok(Some(compose(&self.transforms(path)?)))
    }

    pub fn transforms(&self, path: &[usize]) -> Result<Vec<Transform>> {
        self.element(path)?
            .elements()
            .filter(|(_, child)| Transform::is_transform(&child.name))
            .map(|(_, child)| Transform::from_element(child))
            .collect()
    }

    /// Replaces the transform list of a node.
    ///
    /// Transforms are written into the slots of the old list, in order. Extra transforms are
    /// inserted after the last slot and leftover slots are removed, so the other children and
    /// the indentation are kept.
    pub fn set_transforms(&mut self, path: &[usize], transforms: &[Transform]) -> Result<()> {
        let element = self.element_mut(path)?;
        let slots: Vec<usize> = element
            .elements()
            .filter(|(_, child)| Transform::is_transform(&child.name))
            .map(|(index, _)| index)
            .collect();
        let mut elements = transforms.iter().map(Transform::to_element);

        for &slot in &slots {
            match elements.next() {
                Some(transform) => element.children[slot] = XmlNode::Element(transform),
                None => break,
            }
        }

        for &slot in slots.iter().skip(transforms.len()).rev() {
            element.children.remove(slot);
            if slot > 0 && is_whitespace(&element.children[slot - 1]) {
                element.children.remove(slot - 1);
            }
        }

        let extra: Vec<Element> = elements.collect();
        if extra.is_empty() {
            return Ok(());
        }

        match slots.last() {
            Some(&last) => {
                let indent = indentation(element, slots[0]);
                let mut position = last + 1;
                for transform in extra {
                    if let Some(indent) = &indent {
                        element.children.insert(position, indent.clone());
                        position += 1;
                    }
                    element
                        .children
                        .insert(position, XmlNode::Element(transform));
                    position += 1;
                }
            }
            None => {
                let mut position = element
                    .elements()
                    .find(|(_, child)| child.name != "asset")
                    .map(|(index, _)| index)
                    .unwrap_or(element.children.len());
                let indent = indentation(element, position);
                for transform in extra {
                    element
                        .children
                        .insert(position, XmlNode::Element(transform));
                    position += 1;
                    if let Some(indent) = &indent {
                        element.children.insert(position, indent.clone());
                        position += 1;
                    }
                }
            }
        }

        Ok(())
    }

    /// The controller id an `<instance_controller>` points to.
    pub fn controller_url(&self, path: &[usize]) -> Result<Option<String>> {
        let element = self.element(path)?;
        if element.name != INSTANCE_CONTROLLER {
            return Ok(None);
        }

        Ok(element
            .attribute("url")
            .map(|url| geometry::strip_fragment(url).to_string()))
    }

    /// The geometry bound by a controller's `<skin>`. Controllers without a skin give `None`.
    pub fn skin_geometry(&self, controller: &str) -> Result<Option<String>> {
        let path = self.lookup("controller", "controller", controller)?;
        let skin = match self.element(&path)?.child("skin") {
            Some(skin) => skin,
            None => return Ok(None),
        };

        let source = skin
            .attribute("source")
            .ok_or_else(|| Error::UnresolvedReference {
                kind: "skin source of controller",
                id: controller.to_string(),
            })?;
        let geometry = geometry::strip_fragment(source);
        self.lookup("geometry", "geometry", geometry)?;

        Ok(Some(geometry.to_string()))
    }

    fn mesh(&self, geometry: &str) -> Result<Option<&Element>> {
        let path = self.lookup("geometry", "geometry", geometry)?;
        Ok(self.element(&path)?.child("mesh"))
    }

    /// The primitives of a geometry's mesh. Geometries without a `<mesh>` have none.
    pub fn primitives(&self, geometry: &str) -> Result<Vec<Primitive>> {
        Ok(self
            .mesh(geometry)?
            .map(geometry::primitives)
            .unwrap_or_default())
    }

    pub fn primitive_sources(
        &self,
        geometry: &str,
        primitive: &Primitive,
    ) -> Result<PrimitiveSources> {
        let mesh = self.mesh(geometry)?.ok_or_else(|| Error::UnresolvedReference {
            kind: "mesh",
            id: geometry.to_string(),
        })?;

        geometry::resolve_sources(mesh, geometry, primitive)
    }

    pub fn read_vectors(&self, source: &str) -> Result<Vec<DVec3>> {
        let path = self.lookup("source", "source", source)?;
        geometry::read_vectors(self.element(&path)?)
    }

    pub fn write_vectors(&mut self, source: &str, vectors: &[DVec3]) -> Result<()> {
        let path = self.lookup("source", "source", source)?;
        geometry::write_vectors(self.element_mut(&path)?, vectors)
    }
}

fn is_whitespace(node: &XmlNode) -> bool {
    matches!(node, XmlNode::Text(text) if text.trim().is_empty())
}

/// The whitespace text node right before the child at `index`, if any.
fn indentation(element: &Element, index: usize) -> Option<XmlNode> {
    index
        .checked_sub(1)
        .and_then(|previous| element.children.get(previous))
        .filter(|node| is_whitespace(node))
        .cloned()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SCENE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
	<library_controllers>
		<controller id="skin">
			<skin source="#mesh"/>
		</controller>
		<controller id="morph">
			<morph source="#mesh"/>
		</controller>
		<controller id="broken">
			<skin source="#missing"/>
		</controller>
	</library_controllers>
	<library_geometries>
		<geometry id="mesh">
			<mesh>
				<vertices id="vertices">
					<input semantic="POSITION" source="#positions"/>
				</vertices>
				<polylist count="0">
					<input semantic="VERTEX" source="#vertices" offset="0"/>
				</polylist>
			</mesh>
		</geometry>
	</library_geometries>
	<library_visual_scenes>
		<visual_scene id="unused">
			<node id="other"/>
		</visual_scene>
		<visual_scene id="scene">
			<node id="root">
				<translate sid="translate">1 2 3</translate>
				<rotate sid="rotateX">1 0 0 90</rotate>
				<node id="child">
					<translate>0 1 0</translate>
				</node>
				<instance_controller url="#skin"/>
			</node>
			<node id="empty"/>
		</visual_scene>
	</library_visual_scenes>
	<scene>
		<instance_visual_scene url="#scene"/>
	</scene>
</COLLADA>
"##;

    fn collada() -> Collada {
        SCENE.parse().unwrap()
    }

    fn node(collada: &Collada, id: &str) -> ElementPath {
        collada.root().find_id(id).unwrap()
    }

    #[test]
    fn rejects_other_documents() {
        assert!(matches!(
            "<html/>".parse::<Collada>(),
            Err(Error::NotCollada(name)) if name == "html"
        ));
    }

    #[test]
    fn round_trip() {
        assert_eq!(SCENE, collada().to_string().unwrap());
    }

    #[test]
    fn instantiated_scene() {
        let collada = collada();

        let roots = collada.scene_roots().unwrap();

        assert_eq!(vec![node(&collada, "root"), node(&collada, "empty")], roots);
    }

    #[test]
    fn first_scene_without_scene_element() {
        let text = SCENE.replace("<instance_visual_scene url=\"#scene\"/>", "");
        let collada: Collada = text.parse().unwrap();

        assert_eq!(vec![node(&collada, "other")], collada.scene_roots().unwrap());
    }

    #[test]
    fn missing_visual_scene() {
        let collada: Collada = "<COLLADA><scene/></COLLADA>".parse().unwrap();

        assert!(matches!(
            collada.scene_roots(),
            Err(Error::MissingVisualScene)
        ));
    }

    #[test]
    fn scene_items() {
        let collada = collada();
        let root = node(&collada, "root");

        let children = collada.scene_children(&root).unwrap();

        assert_eq!(2, children.len());
        assert_eq!("child", collada.element(&children[0]).unwrap().attribute("id").unwrap());
        assert_eq!(None, collada.local_matrix(&children[1]).unwrap());
        assert_eq!(
            Some(String::from("skin")),
            collada.controller_url(&children[1]).unwrap()
        );
    }

    #[test]
    fn local_matrix_composes_the_transform_list() {
        let collada = collada();

        let matrix = collada
            .local_matrix(&node(&collada, "root"))
            .unwrap()
            .unwrap();

        assert!(matrix
            .transform_point3(DVec3::Y)
            .abs_diff_eq(DVec3::new(1., 2., 4.), 1e-9));
        assert_eq!(
            Some(DMat4::IDENTITY),
            collada.local_matrix(&node(&collada, "empty")).unwrap()
        );
    }

    #[test]
    fn set_transforms_reuses_slots() {
        let mut collada = collada();
        let root = node(&collada, "root");
        let mut transforms = collada.transforms(&root).unwrap();
        transforms[0].kind = TransformKind::Translate(DVec3::new(1., 3., -2.));
        transforms.insert(1, Transform::rotate(DVec3::X, -90.));

        collada.set_transforms(&root, &transforms).unwrap();

        assert_eq!(transforms, collada.transforms(&root).unwrap());
        assert!(collada.to_string().unwrap().contains(
            "<node id=\"root\">\n\t\t\t\t<translate sid=\"translate\">1 3 -2</translate>\n\t\t\t\t<rotate>1 0 0 -90</rotate>\n\t\t\t\t<rotate sid=\"rotateX\">1 0 0 90</rotate>\n\t\t\t\t<node id=\"child\">"
        ));
    }

    #[test]
    fn set_transforms_removes_leftovers() {
        let mut collada = collada();
        let root = node(&collada, "root");

        collada
            .set_transforms(&root, &[Transform::translate(DVec3::ZERO)])
            .unwrap();

        assert!(collada
            .to_string()
            .unwrap()
            .contains("<node id=\"root\">\n\t\t\t\t<translate>0 0 0</translate>\n\t\t\t\t<node id=\"child\">"));
    }

    #[test]
    fn set_transforms_on_empty_node() {
        let mut collada = collada();
        let empty = node(&collada, "empty");

        collada
            .set_transforms(&empty, &[Transform::translate(DVec3::X)])
            .unwrap();

        assert!(collada
            .to_string()
            .unwrap()
            .contains("<node id=\"empty\"><translate>1 0 0</translate></node>"));
    }

    #[test]
    fn skin_bindings() {
        let collada = collada();

        assert_eq!(
            Some(String::from("mesh")),
            collada.skin_geometry("skin").unwrap()
        );
        assert_eq!(None, collada.skin_geometry("morph").unwrap());
        assert!(matches!(
            collada.skin_geometry("broken"),
            Err(Error::UnresolvedReference { kind: "geometry", .. })
        ));
        assert!(matches!(
            collada.skin_geometry("mesh"),
            Err(Error::UnresolvedReference { kind: "controller", .. })
        ));
    }

    #[test]
    fn references_skip_elements_of_other_kinds() {
        let text = SCENE.replace(
            "<library_controllers>",
            "<library_nodes>\n\t\t<node id=\"skin\"/>\n\t\t<node id=\"mesh\"/>\n\t</library_nodes>\n\t<library_controllers>",
        );
        let collada: Collada = text.parse().unwrap();

        assert_eq!(
            Some(String::from("mesh")),
            collada.skin_geometry("skin").unwrap()
        );
        assert_eq!(1, collada.primitives("mesh").unwrap().len());
    }

    #[test]
    fn geometry_primitives() {
        let collada = collada();

        let primitives = collada.primitives("mesh").unwrap();

        assert_eq!(1, primitives.len());
        assert_eq!(
            String::from("positions"),
            collada
                .primitive_sources("mesh", &primitives[0])
                .unwrap()
                .positions
        );
        assert!(collada.read_vectors("positions").is_err());
    }
}
