//! Recording transform engine for pipeline tests
#![allow(dead_code)]

use sarflow::{EngineError, Product, StageInputs, StageParams, TransformEngine};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const MASTER_SCENE: &str =
    "S1A_IW_SLC__1SDV_20240720T004052_20240720T004119_054837_06AD9C_26F2pre-event.zip";
pub const SLAVE_SCENE: &str =
    "S1A_IW_SLC__1SDV_20240801T004052_20240801T004119_055012_06B3B7_C85Dpost-event.zip";

/// One `apply` call as seen by the engine
#[derive(Debug, Clone)]
pub struct Call {
    pub operator: String,
    pub params: StageParams,
    /// (input name, product id); single inputs are named "source"
    pub inputs: Vec<(String, usize)>,
    pub output: usize,
}

#[derive(Debug, Default)]
pub struct EngineLog {
    pub reads: Vec<(PathBuf, usize)>,
    pub calls: Vec<Call>,
    pub writes: Vec<(PathBuf, String, usize)>,
    pub released: Vec<usize>,
    pub created: usize,
}

#[derive(Debug)]
pub struct MockProduct {
    pub id: usize,
    pub operator: String,
    fail_release: bool,
    log: Arc<Mutex<EngineLog>>,
}

impl Product for MockProduct {
    fn release(self) -> Result<(), EngineError> {
        self.log.lock().unwrap().released.push(self.id);
        if self.fail_release {
            return Err(EngineError::Release(format!("product {} is busy", self.id)));
        }
        Ok(())
    }
}

/// Engine double: records calls, serves band catalogs by operator, creates
/// output files on write and fails where told to.
#[derive(Default)]
pub struct MockEngine {
    pub log: Arc<Mutex<EngineLog>>,
    catalogs: HashMap<String, Vec<String>>,
    fail_operator: Option<String>,
    fail_on_call: Option<usize>,
    fail_write: Option<String>,
    fail_release: HashSet<usize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine serving typical SNAP band catalogs
    pub fn with_snap_catalogs() -> Self {
        Self::new()
            .with_catalog(
                "Terrain-Correction",
                &["Beta0_VH", "Beta0_VV", "incidence_angle"],
            )
            .with_catalog(
                "Interferogram",
                &[
                    "i_ifg_IW2_VV_20Jul2024_01Aug2024",
                    "q_ifg_IW2_VV_20Jul2024_01Aug2024",
                    "Intensity_ifg_IW2_VV_20Jul2024_01Aug2024",
                    "Phase_ifg_IW2_VV_20Jul2024_01Aug2024",
                    "coh_IW2_VV_20Jul2024_01Aug2024",
                ],
            )
    }

    pub fn with_catalog(mut self, operator: &str, bands: &[&str]) -> Self {
        self.catalogs
            .insert(operator.to_string(), bands.iter().map(|b| b.to_string()).collect());
        self
    }

    pub fn failing_operator(mut self, operator: &str) -> Self {
        self.fail_operator = Some(operator.to_string());
        self
    }

    /// Fail the n-th (0-based) call of `failing_operator`
    pub fn failing_on_call(mut self, operator: &str, nth: usize) -> Self {
        self.fail_operator = Some(operator.to_string());
        self.fail_on_call = Some(nth);
        self
    }

    pub fn failing_write(mut self, file_name: &str) -> Self {
        self.fail_write = Some(file_name.to_string());
        self
    }

    pub fn failing_release(mut self, product_id: usize) -> Self {
        self.fail_release.insert(product_id);
        self
    }

    pub fn operators(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|c| c.operator.clone())
            .collect()
    }

    pub fn calls_to(&self, operator: &str) -> Vec<Call> {
        self.log
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.operator == operator)
            .cloned()
            .collect()
    }

    pub fn created(&self) -> usize {
        self.log.lock().unwrap().created
    }

    pub fn released(&self) -> Vec<usize> {
        self.log.lock().unwrap().released.clone()
    }

    /// Every created product released exactly once, in creation order
    pub fn assert_all_released(&self) {
        let log = self.log.lock().unwrap();
        let expected: Vec<usize> = (0..log.created).collect();
        assert_eq!(log.released, expected, "products not released exactly once");
    }

    fn product(&self, operator: &str) -> MockProduct {
        let mut log = self.log.lock().unwrap();
        let id = log.created;
        log.created += 1;
        MockProduct {
            id,
            operator: operator.to_string(),
            fail_release: self.fail_release.contains(&id),
            log: self.log.clone(),
        }
    }
}

impl TransformEngine for MockEngine {
    type Product = MockProduct;

    fn read_product(&self, path: &Path) -> Result<MockProduct, EngineError> {
        let product = self.product("Read");
        self.log
            .lock()
            .unwrap()
            .reads
            .push((path.to_path_buf(), product.id));
        Ok(product)
    }

    fn apply(
        &self,
        operator: &str,
        params: &StageParams,
        inputs: StageInputs<&MockProduct>,
    ) -> Result<MockProduct, EngineError> {
        if self.fail_operator.as_deref() == Some(operator) {
            let seen = self.calls_to(operator).len();
            if self.fail_on_call.map_or(true, |nth| nth == seen) {
                return Err(EngineError::Operator {
                    operator: operator.to_string(),
                    message: "simulated failure".to_string(),
                });
            }
        }

        let inputs = match inputs {
            StageInputs::Single(p) => vec![("source".to_string(), p.id)],
            StageInputs::Named(named) => named
                .into_iter()
                .map(|(name, p)| (name.to_string(), p.id))
                .collect(),
        };

        let product = self.product(operator);
        self.log.lock().unwrap().calls.push(Call {
            operator: operator.to_string(),
            params: params.clone(),
            inputs,
            output: product.id,
        });
        Ok(product)
    }

    fn write_product(&self, product: &MockProduct, path: &Path, format: &str) -> Result<(), EngineError> {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        if file_name.is_some() && file_name == self.fail_write {
            return Err(EngineError::Write {
                path: path.to_path_buf(),
                message: "disk full".to_string(),
            });
        }
        fs::write(path, format!("{} #{}", product.operator, product.id))?;
        self.log
            .lock()
            .unwrap()
            .writes
            .push((path.to_path_buf(), format.to_string(), product.id));
        Ok(())
    }

    fn band_names(&self, product: &MockProduct) -> Result<Vec<String>, EngineError> {
        Ok(self.catalogs.get(&product.operator).cloned().unwrap_or_default())
    }
}

/// Create an empty scene archive named `name` in `dir`
pub fn scene(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"PK").expect("Failed to create scene file");
    path
}

/// Band catalog the stand-in `gpt` writes into every BEAM-DIMAP header
pub const STAND_IN_BANDS: [&str; 3] = [
    "Beta0_VH",
    "Beta0_VV",
    "coh_IW2_VV_20Jul2024_01Aug2024",
];

const STAND_IN_GPT: &str = r##"#!/bin/sh
graph="$1"
fail="@FAIL@"
if [ -n "$fail" ]; then
  id=$(grep -B1 "<operator>$fail</operator>" "$graph" | sed -n 's/.*<node id="\([^"]*\)".*/\1/p' | head -n 1)
  if [ -n "$id" ]; then
    echo "Executing processing graph"
    echo "Error: [NodeId: $id] simulated $fail failure" >&2
    exit 1
  fi
fi
out=$(awk '/<operator>Write<\/operator>/ { w = 1 } w && /<file>/ { sub(/.*<file>/, ""); sub(/<\/file>.*/, ""); print; exit }' "$graph")
case "$out" in
  *.dim)
    mkdir -p "${out%.dim}.data"
    cat > "$out" <<DIM
<Dimap_Document>
  <Image_Interpretation>
@BANDS@
  </Image_Interpretation>
</Dimap_Document>
DIM
    ;;
  *)
    echo "raster" > "$out"
    ;;
esac
"##;

/// Executable stand-in for SNAP's `gpt`.
///
/// Writes the target of the graph's Write node: a BEAM-DIMAP header listing
/// [`STAND_IN_BANDS`] for `.dim` targets, a placeholder raster otherwise. When
/// `failing_operator` appears in the graph it reports that node the way gpt
/// does (`[NodeId: ...]` on stderr) and exits 1.
#[cfg(unix)]
pub fn stand_in_gpt(dir: &Path, failing_operator: Option<&str>) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let bands: Vec<String> = STAND_IN_BANDS
        .iter()
        .map(|band| format!("    <Spectral_Band_Info><BAND_NAME>{}</BAND_NAME></Spectral_Band_Info>", band))
        .collect();
    let script = STAND_IN_GPT
        .replace("@FAIL@", failing_operator.unwrap_or(""))
        .replace("@BANDS@", &bands.join("\n"));

    let path = dir.join("gpt");
    {
        let mut file = fs::File::create(&path).expect("Failed to create gpt stand-in");
        std::io::Write::write_all(&mut file, script.as_bytes()).expect("Failed to write gpt stand-in");
        file.sync_all().expect("Failed to sync gpt stand-in");
    }
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("Failed to chmod gpt stand-in");
    path
}

/// Files left in a directory with the given extension
pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("Failed to list directory")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == extension))
        .collect()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
