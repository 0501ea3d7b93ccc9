use serde::{Deserialize, Serialize};

use crate::{error::ImportError, postprocess::PostProcessSteps};

pub const MIN_UNIT_SCALE: f32 = 0.01;
pub const MAX_UNIT_SCALE: f32 = 1000.0;

/// What happens to a sub-asset that already exists when its model is imported again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReimportPolicy {
    /// Delete and rewrite it. Hand edits are lost and it gets a new id.
    #[default]
    Overwrite,
    /// Leave the file and its id alone.
    KeepExisting,
}

/// How bone weights are written into the four vertex slots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoneWeightMode {
    /// The k-th weight entry of every bone lands in slot k of its vertex (k < 4).
    /// Matches meshes exported by earlier versions of the importer.
    #[default]
    BoneSlot,
    /// Every vertex keeps its four strongest influences.
    TopInfluences,
}

/// Per-model importer options, stored in the model's meta file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelImportSettings {
    pub generate_normals: bool,
    /// Only honoured together with `generate_normals`.
    pub generate_smooth_normals: bool,
    pub calculate_tangent_space: bool,
    pub triangulate: bool,
    pub make_left_handed: bool,
    pub flip_uvs: bool,
    pub optimize_meshes: bool,
    pub flip_winding_order: bool,
    pub weld_vertices: bool,
    /// Kept for meta files that carry it. Nothing reads it.
    pub invert_normals: bool,
    pub global_scale: bool,
    pub unit_scale: f32,
    pub reimport_policy: ReimportPolicy,
    pub bone_weight_mode: BoneWeightMode,
}

impl Default for ModelImportSettings {
    fn default() -> Self {
        Self {
            generate_normals: true,
            generate_smooth_normals: false,
            calculate_tangent_space: true,
            triangulate: true,
            make_left_handed: true,
            flip_uvs: false,
            optimize_meshes: false,
            flip_winding_order: false,
            weld_vertices: false,
            invert_normals: false,
            global_scale: false,
            unit_scale: 1.0,
            reimport_policy: ReimportPolicy::default(),
            bone_weight_mode: BoneWeightMode::default(),
        }
    }
}

impl ModelImportSettings {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ImportError> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, ImportError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn post_process_steps(&self) -> PostProcessSteps {
        let mut steps = PostProcessSteps::LIMIT_BONE_WEIGHTS;
        if self.generate_normals && self.generate_smooth_normals {
            steps |= PostProcessSteps::GENERATE_SMOOTH_NORMALS;
        } else if self.generate_normals {
            steps |= PostProcessSteps::GENERATE_NORMALS;
        }
        if self.calculate_tangent_space {
            steps |= PostProcessSteps::CALC_TANGENT_SPACE;
        }
        if self.triangulate {
            steps |= PostProcessSteps::TRIANGULATE;
        }
        if self.make_left_handed {
            steps |= PostProcessSteps::MAKE_LEFT_HANDED;
        }
        if self.flip_uvs {
            steps |= PostProcessSteps::FLIP_UVS;
        }
        if self.optimize_meshes {
            steps |= PostProcessSteps::OPTIMIZE_MESHES;
        }
        if self.flip_winding_order {
            steps |= PostProcessSteps::FLIP_WINDING_ORDER;
        }
        if self.weld_vertices {
            steps |= PostProcessSteps::JOIN_IDENTICAL_VERTICES;
        }
        if self.global_scale {
            steps |= PostProcessSteps::GLOBAL_SCALE;
        }
        steps
    }

    /// Scale applied to the imported root, clamped to the range the editor allows.
    pub fn effective_unit_scale(&self) -> f32 {
        if self.unit_scale.is_finite() {
            self.unit_scale.clamp(MIN_UNIT_SCALE, MAX_UNIT_SCALE)
        } else {
            1.0
        }
    }
}
