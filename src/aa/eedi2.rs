// src/aa/eedi2.rs

use crate::aa::Interpolator;
use crate::aa::shift::Shifter;
use crate::engine::{Engine, PluginArgs, require_plugin};
use crate::error::{AdaptError, Result};
use crate::frame::VideoClip;
use log::debug;

/// Parameters for the EEDI2 edge-directed interpolator.
#[derive(Debug, Clone, PartialEq)]
pub struct Eedi2 {
    pub mthresh: i32,
    pub lthresh: i32,
    pub vthresh: i32,
    pub estr: i32,
    pub dstr: i32,
    pub maxd: i32,
    pub pp: i32,
    /// Field kept by the interpolator, 0 or 1.
    pub field: u8,
    /// Use `eedi2cuda` instead of `eedi2`. Required for `Enlarge2`.
    pub cuda: bool,
    pub shifter: Shifter,
}

impl Default for Eedi2 {
    fn default() -> Self {
        Eedi2 {
            mthresh: 10,
            lthresh: 20,
            vthresh: 20,
            estr: 2,
            dstr: 4,
            maxd: 24,
            pp: 1,
            field: 0,
            cuda: false,
            shifter: Shifter::default(),
        }
    }
}

impl Eedi2 {
    pub fn cuda() -> Self {
        Eedi2 { cuda: true, ..Self::default() }
    }

    /// Vertical correction applied after collapsing the doubled clip back to
    /// its original height.
    pub fn field_shift(field: u8) -> f64 {
        -0.5 - 0.75 * field as f64
    }

    pub fn aa_args(&self) -> PluginArgs {
        PluginArgs::new()
            .with("mthresh", self.mthresh)
            .with("lthresh", self.lthresh)
            .with("vthresh", self.vthresh)
            .with("estr", self.estr)
            .with("dstr", self.dstr)
            .with("maxd", self.maxd)
            .with("pp", self.pp)
    }

    fn namespace(&self) -> &'static str {
        if self.cuda { "eedi2cuda" } else { "eedi2" }
    }
}

impl Interpolator for Eedi2 {
    const SHIFT: f64 = -0.5;

    fn field(&self) -> u8 {
        self.field
    }

    fn with_field(&self, field: u8) -> Self {
        Eedi2 { field, ..self.clone() }
    }

    fn shifter(&self) -> &Shifter {
        &self.shifter
    }

    fn interpolate(&self, engine: &dyn Engine, clip: &VideoClip, double_y: bool) -> Result<VideoClip> {
        if self.field > 1 {
            return Err(AdaptError::Input(format!("EEDI2: field must be 0 or 1, got {}", self.field)));
        }
        let namespace = self.namespace();
        require_plugin(engine, namespace)?;

        let args = PluginArgs::new()
            .with("clip", clip.clone())
            .with("field", self.field as i64)
            .merged(self.aa_args());
        debug!("{}.EEDI2({})", namespace, args);
        let doubled = engine.invoke(namespace, "EEDI2", args)?;

        if double_y {
            return Ok(doubled);
        }

        let single = doubled.first_field(self.field == 0)?;
        self.shifter.shift(engine, &single, (Self::field_shift(self.field), 0.0))
    }

    fn full_interpolate_enabled(&self, x: bool, y: bool) -> bool {
        self.cuda && x && y
    }

    fn full_interpolate(
        &self,
        engine: &dyn Engine,
        clip: &VideoClip,
        double_y: bool,
        double_x: bool,
    ) -> Result<VideoClip> {
        if !self.full_interpolate_enabled(double_x, double_y) {
            return Err(AdaptError::Plugin(
                "EEDI2: Enlarge2 needs the cuda plugin and both axes doubled".to_string(),
            ));
        }
        require_plugin(engine, "eedi2cuda")?;
        let args = PluginArgs::new().with("clip", clip.clone()).merged(self.aa_args());
        debug!("eedi2cuda.Enlarge2({})", args);
        engine.invoke("eedi2cuda", "Enlarge2", args)
    }
}
