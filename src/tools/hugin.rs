//! Panorama stitching with the Hugin tool chain
//!
//! Inputs are developed to TIFF in a scratch directory, control points are
//! found and optimised once, then one panorama is rendered and blended per
//! requested projection. A failing stage is only logged; the blended file
//! missing at the end is what fails the stitch.

use super::darktable::Converter;
use super::run_stage;
use crate::error::{PanoError, Result};
use raw_pano_common::sequence_identity;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Projections understood by `pano_modify`, indexed by their numeric id
pub const PROJECTIONS: &[&str] = &[
    "rectilinear",
    "circular",
    "equirectangular",
    "fisheye_ff",
    "stereographic",
    "mercator",
    "trans_mercator",
    "sinusoidal",
    "lambert_equal_area_conic",
    "lambert_azimuthal",
    "albers_equal_area_conic",
    "miller_cylindrical",
    "panini",
    "architectural",
    "orthographic",
    "equisolid",
    "equi_panini",
    "biplane",
    "triplane",
    "panini_general",
    "thoby",
    "hammer",
];

/// One of [`PROJECTIONS`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Projection(usize);

impl Projection {
    /// Look up a projection by name or numeric id
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Some(index) = PROJECTIONS.iter().position(|p| *p == value) {
            return Ok(Self(index));
        }
        match value.parse::<usize>() {
            Ok(index) if index < PROJECTIONS.len() => Ok(Self(index)),
            _ => Err(PanoError::InvalidProjection(value.to_string())),
        }
    }

    pub fn index(&self) -> usize {
        self.0
    }

    pub fn name(&self) -> &'static str {
        PROJECTIONS[self.0]
    }
}

impl std::str::FromStr for Projection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).map_err(|e| e.to_string())
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchOptions {
    /// Open the Hugin GUI before rendering
    pub adjust: bool,
    /// darktable style applied while developing the inputs
    pub style: Option<String>,
    /// Empty renders rectilinear only
    pub projections: Vec<Projection>,
    /// Intermediate file extension
    pub from_format: String,
    pub prefix: String,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            adjust: false,
            style: None,
            projections: Vec::new(),
            from_format: "tif".into(),
            prefix: String::new(),
        }
    }
}

impl StitchOptions {
    /// Output file stem shared by every projection of one stitch
    pub fn output_prefix<S: AsRef<str>>(&self, names: &[S]) -> String {
        format!(
            "{}{}-{}-{}",
            self.prefix,
            sequence_identity(names),
            self.style.as_deref().unwrap_or("none"),
            if self.adjust { "a" } else { "n" }
        )
    }
}

/// Assembles one panorama file per projection into `output_dir`
pub trait Stitcher: Send + Sync {
    fn stitch(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        options: &StitchOptions,
    ) -> Result<Vec<PathBuf>>;
}

pub struct HuginStitcher {
    converter: Converter,
}

impl HuginStitcher {
    pub fn new(converter: Converter) -> Self {
        Self { converter }
    }
}

impl Stitcher for HuginStitcher {
    fn stitch(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        options: &StitchOptions,
    ) -> Result<Vec<PathBuf>> {
        let names: Vec<String> = inputs
            .iter()
            .filter_map(|p| p.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .collect();
        let prefix = options.output_prefix(&names);
        info!("starting panorama creation: {}", prefix);

        let tmp = tempfile::Builder::new().prefix("pano_").tempdir()?;

        let mut sources: Vec<OsString> = Vec::with_capacity(inputs.len());
        for photo in inputs {
            let target = tmp
                .path()
                .join(photo.with_extension(&options.from_format).file_name().unwrap_or_default());
            self.converter
                .convert(photo, &target, options.style.as_deref(), true)?;
            debug!("developed {} to {}", photo.display(), target.display());
            sources.push(target.into_os_string());
        }

        let pto = tmp.path().join(format!("{prefix}.pto"));
        let pf = pto.to_string_lossy().to_string();
        let pf = pf.as_str();

        let mut pto_gen = sources;
        pto_gen.push("-o".into());
        pto_gen.push(pf.into());
        run_stage("pto_gen", pto_gen);
        run_stage("cpfind", ["--celeste", "-o", pf, pf]);
        run_stage("cpclean", ["-o", pf, pf]);
        run_stage("linefind", ["--lines", "3", "-o", pf, pf]);
        run_stage("autooptimiser", ["-q", "-a", "-l", "-m", "-s", "-o", pf, pf]);

        let projections = if options.projections.is_empty() {
            vec![Projection::default()]
        } else {
            options.projections.clone()
        };

        let render_base = tmp.path().join(&prefix).to_string_lossy().to_string();
        let mut outputs = Vec::with_capacity(projections.len());
        for projection in projections {
            info!("rendering projection {}", projection);
            let index = projection.index().to_string();
            run_stage(
                "pano_modify",
                [
                    "--projection",
                    index.as_str(),
                    "--fov",
                    "AUTO",
                    "--canvas",
                    "AUTO",
                    "--straighten",
                    "--center",
                    "--crop",
                    "0,100,0,100%",
                    "--output-type",
                    "NORMAL",
                    "-o",
                    pf,
                    pf,
                ],
            );

            if options.adjust {
                run_stage("hugin", [pf]);
            }

            run_stage(
                "nona",
                [
                    "-g",
                    "-z",
                    "LZW",
                    "-o",
                    render_base.as_str(),
                    "--bigtiff",
                    "-m",
                    "TIFF_m",
                    pf,
                ],
            );

            let out_file = output_dir.join(format!("{prefix}-{projection}.tif"));
            if out_file.is_file() {
                debug!("removing previous panorama {}", out_file.display());
                std::fs::remove_file(&out_file)?;
            }
            let layers = rendered_layers(tmp.path(), &prefix)?;
            let mut enblend: Vec<OsString> = vec!["-o".into(), out_file.clone().into_os_string()];
            enblend.extend(layers.iter().map(|l| l.clone().into_os_string()));
            run_stage("enblend", enblend);
            // the next projection renders under the same prefix
            for layer in &layers {
                std::fs::remove_file(layer)?;
            }

            if !out_file.is_file() {
                error!("panorama not created: {}", out_file.display());
                return Err(PanoError::StitchFailed(out_file));
            }
            info!("panorama created: {}", out_file.display());
            outputs.push(out_file);
        }

        info!("panorama creation complete: {}", prefix);
        Ok(outputs)
    }
}

/// TIFF layers nona wrote for `prefix`, sorted
fn rendered_layers(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut layers: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "tif")
                && p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(prefix))
        })
        .collect();
    layers.sort();
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ConvertTool;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_projection_by_name_and_index() {
        assert_eq!(Projection::parse("rectilinear").unwrap().index(), 0);
        assert_eq!(Projection::parse("equirectangular").unwrap().index(), 2);
        assert_eq!(Projection::parse("12").unwrap().name(), "panini");
        assert_eq!(Projection::default().name(), "rectilinear");
    }

    #[test]
    fn test_projection_unknown() {
        assert!(matches!(
            Projection::parse("spherical"),
            Err(PanoError::InvalidProjection(_))
        ));
        assert!(Projection::parse("22").is_err());
        assert!("hammer".parse::<Projection>().is_ok());
    }

    #[test]
    fn test_output_prefix() {
        let options = StitchOptions::default();
        assert_eq!(options.output_prefix(&["IMG3", "IMG1", "IMG2"]), "IMG1-IMG3-none-n");

        let options = StitchOptions {
            adjust: true,
            style: Some("vivid".into()),
            prefix: "trip_".into(),
            ..Default::default()
        };
        assert_eq!(options.output_prefix(&["IMG1", "IMG2"]), "trip_IMG1-IMG2-vivid-a");
    }

    #[test]
    fn test_rendered_layers() {
        let dir = tempdir().unwrap();
        for name in ["p0001.tif", "p0000.tif", "IMG1.tif", "p.pto"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let layers = rendered_layers(dir.path(), "p").unwrap();
        let names: Vec<_> = layers
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["p0000.tif", "p0001.tif"]);
    }

    struct Develop;

    impl ConvertTool for Develop {
        fn develop(&self, _input: &Path, output: &Path, _style: Option<&str>) -> Result<()> {
            std::fs::write(output, b"tif")?;
            Ok(())
        }
    }

    #[test]
    fn test_failed_stages_leave_no_stale_panorama() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("IMG1.NEF");
        std::fs::write(&input, b"raw").unwrap();
        let out_dir = dir.path().join("Panoramas");
        std::fs::create_dir(&out_dir).unwrap();
        let stale = out_dir.join("IMG1-IMG1-none-n-rectilinear.tif");
        std::fs::write(&stale, b"old").unwrap();

        let stitcher = HuginStitcher::new(Converter::new(Arc::new(Develop), Vec::new()));
        let result = stitcher.stitch(&[input], &out_dir, &StitchOptions::default());

        assert!(matches!(result, Err(PanoError::StitchFailed(p)) if p == stale));
        assert!(!stale.exists());
    }
}
