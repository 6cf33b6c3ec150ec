//! Removes the rotation the exporter bakes into skeleton roots.
//!
//! Every root gets a compensating rotation right after its leading transform. The translations
//! of the whole subtree are mapped through the inverse rotation, and the positions and normals
//! of the skinned polygon lists below the root are rotated the other way so the rendered result
//! does not change.

use std::iter;

use glam::{DMat3, DVec3};

use crate::{
    error::Result,
    format::collada::{Collada, ElementPath, Transform, TransformKind},
    math,
};

/// What was changed below one scene root.
#[derive(Debug, Clone, PartialEq)]
pub struct RootCorrection {
    pub root: ElementPath,
    /// The axis of the compensating rotation.
    pub axis: DVec3,
    /// The angle of the compensating rotation, in degrees.
    pub angle: f64,
    /// The number of nodes whose translation was rewritten.
    pub nodes: usize,
    /// The number of data sources that were rotated.
    pub sources: usize,
}

/// Corrects every root node of the instantiated visual scene.
pub fn correct_scene(collada: &mut Collada) -> Result<Vec<RootCorrection>> {
    let mut corrections = Vec::new();

    for root in collada.scene_roots()? {
        if let Some(correction) = correct_root(collada, &root)? {
            tracing::info!(
                "Root {:?}: compensated {:.3} degrees about {}, {} node(s) and {} source(s) updated",
                collada.element(&root)?.attribute("id").unwrap_or_default(),
                correction.angle,
                correction.axis,
                correction.nodes,
                correction.sources
            );
            corrections.push(correction);
        }
    }

    Ok(corrections)
}

/// Corrects the subtree of a single root. Scene items without a local matrix are left alone.
pub fn correct_root(collada: &mut Collada, root: &[usize]) -> Result<Option<RootCorrection>> {
    let matrix = match collada.local_matrix(root)? {
        Some(matrix) => matrix,
        None => return Ok(None),
    };

    let rotation = math::decompose(&matrix)?.rotation;
    let inverse = rotation.inverse();
    let (axis, angle) = math::to_axis_angle(&inverse);

    // The compensation goes right after the leading transform, which the translation pass
    // replaces. An empty list gets a placeholder translate first.
    let mut transforms = collada.transforms(root)?;
    if transforms.is_empty() {
        transforms.push(Transform::translate(DVec3::ZERO));
    }
    transforms.insert(1, Transform::rotate(axis, angle));
    collada.set_transforms(root, &transforms)?;

    let nodes = correct_translations(collada, root, &inverse)?;

    let mut geometries = Vec::new();
    collect_skinned_geometries(collada, root, &mut geometries)?;
    let sources = rotate_sources(collada, &geometries, &rotation)?;

    Ok(Some(RootCorrection {
        root: root.to_vec(),
        axis,
        angle,
        nodes,
        sources,
    }))
}

/// Replaces the leading translate of every node below `path`, pre-order, with its translation
/// mapped through `inverse`. Returns the number of nodes visited.
fn correct_translations(collada: &mut Collada, path: &[usize], inverse: &DMat3) -> Result<usize> {
    let matrix = match collada.local_matrix(path)? {
        Some(matrix) => matrix,
        None => return Ok(0),
    };
    let translation = *inverse * math::translation(&matrix);

    let mut transforms = collada.transforms(path)?;
    let sid = if transforms.is_empty() {
        None
    } else {
        let first = transforms.remove(0);
        if !matches!(first.kind, TransformKind::Translate(_)) {
            tracing::warn!(
                "Node {:?} does not start with a translate; its first transform is replaced",
                collada.element(path)?.attribute("id").unwrap_or_default()
            );
        }
        first.sid
    };
    transforms.insert(
        0,
        Transform {
            sid,
            kind: TransformKind::Translate(translation),
        },
    );
    collada.set_transforms(path, &transforms)?;

    tracing::debug!(
        "Node {:?}: translation set to {}",
        collada.element(path)?.attribute("id").unwrap_or_default(),
        translation
    );

    let mut visited = 1;
    for child in collada.scene_children(path)? {
        visited += correct_translations(collada, &child, inverse)?;
    }

    Ok(visited)
}

/// Collects the geometries bound by skin controllers anywhere below `path`.
fn collect_skinned_geometries(
    collada: &Collada,
    path: &[usize],
    geometries: &mut Vec<String>,
) -> Result<()> {
    if let Some(controller) = collada.controller_url(path)? {
        match collada.skin_geometry(&controller)? {
            Some(geometry) if !geometries.contains(&geometry) => geometries.push(geometry),
            Some(_) => {}
            None => tracing::debug!("Controller \"{}\" has no skin; skipped", controller),
        }
    }

    for child in collada.scene_children(path)? {
        collect_skinned_geometries(collada, &child, geometries)?;
    }

    Ok(())
}

/// Rotates the position and normal sources of every polygon list of the given geometries.
/// A source shared by several primitives is rotated once. Returns the number of sources.
fn rotate_sources(collada: &mut Collada, geometries: &[String], rotation: &DMat3) -> Result<usize> {
    let mut rotated: Vec<String> = Vec::new();

    for geometry in geometries {
        for primitive in collada.primitives(geometry)? {
            if !primitive.is_polylist() {
                tracing::debug!(
                    "Geometry \"{}\": {} {} is not a polygon list; skipped",
                    geometry,
                    primitive.kind,
                    primitive.index
                );
                continue;
            }

            let sources = collada.primitive_sources(geometry, &primitive)?;
            for source in iter::once(sources.positions).chain(sources.normals) {
                if rotated.contains(&source) {
                    continue;
                }

                let mut vectors = collada.read_vectors(&source)?;
                math::rotate_vectors(rotation, &mut vectors);
                collada.write_vectors(&source, &vectors)?;

                tracing::debug!("Source \"{}\": {} vector(s) rotated", source, vectors.len());
                rotated.push(source);
            }
        }
    }

    Ok(rotated.len())
}
