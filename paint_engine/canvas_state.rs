/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The immutable, reference-counted canvas state tree (spec.md §3) and the
//! transient-state discipline that substitutes for copy-on-write at tree
//! nodes.

use std::collections::HashMap;
use std::sync::Arc;

use paint_traits::LayerId;

use crate::renderer::Tile15;

/// One rendered tile's worth of already-composited pixel content for a
/// content layer. Standing in for the out-of-scope paint-pixel kernels:
/// rather than re-deriving pixels from stroke history on every read, a
/// content layer simply carries the tiles the (external) kernel already
/// painted into it.
pub type TileContent = HashMap<(u32, u32), Tile15>;

/// One node of the layer tree.
#[derive(Clone, Debug)]
pub enum LayerNode {
    Group {
        id: LayerId,
        children: Arc<Vec<LayerNode>>,
    },
    Content {
        id: LayerId,
        tiles: Arc<TileContent>,
    },
}

impl LayerNode {
    pub fn id(&self) -> LayerId {
        match self {
            LayerNode::Group { id, .. } => *id,
            LayerNode::Content { id, .. } => *id,
        }
    }
}

/// Returns a copy of `layers` with the content layer `target`'s tiles
/// replaced by `f(old_tiles)`. Every other node is cloned cheaply (the
/// clone only copies `Arc` pointers, never the subtrees they point to) —
/// the design substitute for copy-on-write at tree nodes (spec.md §3, §9).
/// There are no parent back-pointers; callers needing a path to `target`
/// recurse with an explicit index stack instead (spec.md §9).
pub fn map_content_layer(
    layers: &[LayerNode],
    target: LayerId,
    f: &mut dyn FnMut(&TileContent) -> TileContent,
) -> Vec<LayerNode> {
    layers
        .iter()
        .map(|node| match node {
            LayerNode::Content { id, tiles } if *id == target => LayerNode::Content {
                id: *id,
                tiles: Arc::new(f(tiles)),
            },
            LayerNode::Group { id, children } => LayerNode::Group {
                id: *id,
                children: Arc::new(map_content_layer(children, target, f)),
            },
            other => other.clone(),
        })
        .collect()
}

/// Presentation attributes for one layer, mirrored 1:1 against the layer
/// tree's shape (spec.md §3). `opacity` is expressed in the engine's
/// 15-bit fixed-point range, `0..=32768`, matching the compositor's
/// internal precision (spec.md §4.6, §4.8).
#[derive(Clone, Debug, PartialEq)]
pub struct LayerPropsNode {
    pub id: LayerId,
    pub opacity: u16,
    pub blend_mode: u8,
    /// Set by local-view projection when the active view mode hides this
    /// layer (spec.md §4.6); never set by canvas history itself.
    pub hidden_by_view_mode: bool,
    /// Set when this tile's content is censored and not currently revealed.
    pub censored: bool,
    /// The context id that authored this layer, if known. Used by the
    /// inspect overlay (spec.md §4.6).
    pub origin_context: Option<paint_traits::ContextId>,
    pub children: Vec<LayerPropsNode>,
}

pub type LayerPropsList = Arc<Vec<LayerPropsNode>>;

pub type AnnotationList = Arc<Vec<(paint_traits::AnnotationId, (i32, i32, u32, u32))>>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeline {
    pub frame_count: u32,
}

/// The shared, immutable data reachable from a published [`CanvasState`].
#[derive(Clone, Debug)]
pub struct CanvasStateInner {
    pub width: u32,
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub layers: Arc<Vec<LayerNode>>,
    pub layer_props: LayerPropsList,
    pub annotations: AnnotationList,
    pub metadata: Arc<DocumentMetadata>,
    pub timeline: Arc<Timeline>,
}

impl CanvasStateInner {
    pub fn empty(width: u32, height: u32) -> Self {
        CanvasStateInner {
            width,
            height,
            offset_x: 0,
            offset_y: 0,
            layers: Arc::new(Vec::new()),
            layer_props: Arc::new(Vec::new()),
            annotations: Arc::new(Vec::new()),
            metadata: Arc::new(DocumentMetadata::default()),
            timeline: Arc::new(Timeline::default()),
        }
    }
}

/// An immutable, shareable canvas state. Any number of readers may hold a
/// clone of this at once; nothing reachable from it is ever mutated after
/// publication (spec.md §3's core invariant).
#[derive(Clone, Debug)]
pub struct CanvasState(Arc<CanvasStateInner>);

impl CanvasState {
    pub fn new(inner: CanvasStateInner) -> Self {
        CanvasState(Arc::new(inner))
    }

    pub fn empty(width: u32, height: u32) -> Self {
        CanvasState::new(CanvasStateInner::empty(width, height))
    }

    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn height(&self) -> u32 {
        self.0.height
    }

    pub fn offset(&self) -> (i32, i32) {
        (self.0.offset_x, self.0.offset_y)
    }

    pub fn layers(&self) -> &Arc<Vec<LayerNode>> {
        &self.0.layers
    }

    pub fn layer_props(&self) -> &LayerPropsList {
        &self.0.layer_props
    }

    pub fn annotations(&self) -> &AnnotationList {
        &self.0.annotations
    }

    pub fn metadata(&self) -> &Arc<DocumentMetadata> {
        &self.0.metadata
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.0.timeline
    }

    /// Pointer identity, used throughout the engine as an immutability
    /// proxy (spec.md §4.7 point 4, §4.5 step 2).
    pub fn ptr_eq(&self, other: &CanvasState) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn inner(&self) -> &CanvasStateInner {
        &self.0
    }
}

/// A [`CanvasState`] known to have exactly one owner, and therefore safe to
/// mutate in place. This is the design substitute for copy-on-write at tree
/// nodes (spec.md §3).
pub struct TransientCanvasState(CanvasStateInner);

impl TransientCanvasState {
    /// Returns `cs` as a transient state: if `cs` is already uniquely
    /// owned, it is unwrapped in place; otherwise a shallow copy (cloning
    /// only the top-level `Arc` pointers, not the subtrees they point to)
    /// is forked and the input reference is dropped.
    pub fn get_or_make_transient(cs: CanvasState) -> TransientCanvasState {
        match Arc::try_unwrap(cs.0) {
            Ok(inner) => TransientCanvasState(inner),
            Err(shared) => TransientCanvasState((*shared).clone()),
        }
    }

    pub fn publish(self) -> CanvasState {
        CanvasState::new(self.0)
    }

    pub fn set_dimensions(&mut self, width: u32, height: u32) {
        self.0.width = width;
        self.0.height = height;
    }

    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.0.offset_x = x;
        self.0.offset_y = y;
    }

    pub fn set_layers(&mut self, layers: Vec<LayerNode>) {
        self.0.layers = Arc::new(layers);
    }

    pub fn set_layer_props(&mut self, props: Vec<LayerPropsNode>) {
        self.0.layer_props = Arc::new(props);
    }

    pub fn inner(&self) -> &CanvasStateInner {
        &self.0
    }

    pub fn inner_mut(&mut self) -> &mut CanvasStateInner {
        &mut self.0
    }
}
