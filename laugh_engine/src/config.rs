/// Renderer configuration, debug messenger settings and fixed sizes

use std::path::PathBuf;
use glam::Vec3;

// ===== FIXED SIZES =====

/// Edge length of the BRDF lookup table (square, 2 channels)
pub const BRDF_LUT_SIZE: u32 = 256;

/// Local workgroup edge of the BRDF compute shader
pub const BRDF_WORKGROUP_SIZE: u32 = 16;

/// Host arena size for every per-frame uniform structure
pub const UNIFORM_BLOB_SIZE: u64 = 64 * 1024;

/// Number of point lights fed to the lighting subpass (specialization constant 0)
pub const NUM_LIGHTS: usize = 2;

/// Face size of the diffuse irradiance cube map (single mip)
pub const DIFF_IRRADIANCE_MAP_SIZE: u32 = 32;

/// Face size of the specular irradiance cube map (full mip chain)
pub const SPEC_IRRADIANCE_MAP_SIZE: u32 = 256;

/// Horizontal + vertical blur repetitions of the bloom chain
pub const DEFAULT_BLOOM_ITERATIONS: u32 = 5;

/// Number of mip levels of a full chain for a square image of `size`
pub fn full_mip_count(size: u32) -> u32 {
    32 - size.max(1).leading_zeros()
}

// ===== DISPLAY MODE =====

/// What the final composition pass writes to the swap chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum DisplayMode {
    /// Lit HDR result with bloom, tone mapped
    #[default]
    Lit = 0,
    Albedo = 1,
    Normal = 2,
    Position = 3,
    Roughness = 4,
    Metalness = 5,
    AmbientOcclusion = 6,
    Depth = 7,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 8] = [
        DisplayMode::Lit,
        DisplayMode::Albedo,
        DisplayMode::Normal,
        DisplayMode::Position,
        DisplayMode::Roughness,
        DisplayMode::Metalness,
        DisplayMode::AmbientOcclusion,
        DisplayMode::Depth,
    ];

    /// Cycle to the next mode (wraps around)
    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::ALL.len()]
    }

    /// Mode for a numeric key (1 = Lit, 2 = Albedo, ...)
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

// ===== LIGHTS =====

/// Point light as uploaded to the lighting subpass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub radius: f32,
}

/// The two lights of the default scene
pub fn default_lights() -> [PointLight; NUM_LIGHTS] {
    [
        PointLight {
            position: Vec3::new(-2.0, 2.0, 2.0),
            color: Vec3::new(10.0, 10.0, 10.0),
            radius: 10.0,
        },
        PointLight {
            position: Vec3::new(2.0, 1.5, -2.0),
            color: Vec3::new(6.0, 5.0, 4.0),
            radius: 8.0,
        },
    ]
}

// ===== DEBUG MESSENGER SETTINGS =====

/// Minimum validation message severity forwarded by the debug messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    ErrorsOnly,
    ErrorsAndWarnings,
    All,
}

/// Where validation messages go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    Console,
    File(PathBuf),
    Both(PathBuf),
}

impl DebugOutput {
    /// Log file path, if any
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            DebugOutput::Console => None,
            DebugOutput::File(path) | DebugOutput::Both(path) => Some(path),
        }
    }

    pub fn writes_console(&self) -> bool {
        matches!(self, DebugOutput::Console | DebugOutput::Both(_))
    }
}

/// Message categories forwarded by the debug messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_validation: bool,
    pub show_performance: bool,
    pub show_general: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_validation: true,
            show_performance: true,
            show_general: false,
        }
    }
}

/// Validation message counters collected by the debug messenger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

// ===== RENDERER CONFIG =====

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial surface width
    pub width: u32,
    /// Initial surface height
    pub height: u32,
    /// Directory holding persisted precomputed maps (BRDF LUT, irradiance)
    pub asset_dir: PathBuf,
    /// Directory holding compiled SPIR-V shaders
    pub shader_dir: PathBuf,
    /// Horizontal + vertical blur repetitions
    pub bloom_iterations: u32,
    /// Initial display mode
    pub display_mode: DisplayMode,

    /// Enable validation/debug layers
    pub enable_validation: bool,
    pub debug_severity: DebugSeverity,
    pub debug_output: DebugOutput,
    pub debug_message_filter: DebugMessageFilter,
    /// Trigger a debugger break on validation errors (debug builds only)
    pub break_on_validation_error: bool,
    /// Panic on the first validation error
    pub panic_on_error: bool,
    pub enable_validation_stats: bool,

    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),

    pub lights: [PointLight; NUM_LIGHTS],
    /// Swap chain acquisition timeout in nanoseconds
    pub acquire_timeout_ns: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            asset_dir: PathBuf::from("assets"),
            shader_dir: PathBuf::from("shaders"),
            bloom_iterations: DEFAULT_BLOOM_ITERATIONS,
            display_mode: DisplayMode::Lit,
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: cfg!(debug_assertions),
            app_name: "Laugh Engine".to_string(),
            app_version: (1, 0, 0),
            lights: default_lights(),
            acquire_timeout_ns: u64::MAX,
        }
    }
}

impl RendererConfig {
    /// Path of a persisted precomputed map inside `asset_dir`
    pub fn asset_path(&self, file_name: &str) -> PathBuf {
        self.asset_dir.join(file_name)
    }

    /// Path of a SPIR-V shader inside `shader_dir`
    pub fn shader_path(&self, shader_name: &str) -> PathBuf {
        self.shader_dir.join(format!("{}.spv", shader_name))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
