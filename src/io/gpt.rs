//! ESA SNAP graph processing tool (`gpt`) adapter
//!
//! Products are lazy: each one is the lineage of graph nodes that produces it.
//! Nothing runs until a band catalog is requested or a product is written.
//! Asking for band names materializes the product once as BEAM-DIMAP in a
//! scratch workspace; products derived from it afterwards start from a `Read`
//! of that file instead of recomputing the lineage.

use crate::config::GptSettings;
use crate::io::engine::{EngineError, Product, StageInputs, TransformEngine};
use crate::logging::RunLogger;
use crate::types::StageParams;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tempfile::TempDir;

/// SNAP's native product format, used for intermediate products
const DIMAP_FORMAT: &str = "BEAM-DIMAP";

/// Lines of engine output kept in error messages
const OUTPUT_TAIL_LINES: usize = 20;

/// Prefix gpt puts before the id of the node an error comes from
const NODE_ID_MARKER: &str = "[NodeId:";

/// One operator node of a processing graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub operator: String,
    /// (source element name, referenced node id)
    pub sources: Vec<(String, String)>,
    pub parameters: Vec<(String, String)>,
}

impl GraphNode {
    fn read(id: String, file: &Path) -> Self {
        Self {
            id,
            operator: "Read".to_string(),
            sources: Vec::new(),
            parameters: vec![("file".to_string(), file.to_string_lossy().into_owned())],
        }
    }

    fn write(id: String, source: &str, file: &Path, format: &str) -> Self {
        Self {
            id,
            operator: "Write".to_string(),
            sources: vec![("sourceProduct".to_string(), source.to_string())],
            parameters: vec![
                ("file".to_string(), file.to_string_lossy().into_owned()),
                ("formatName".to_string(), format.to_string()),
            ],
        }
    }
}

/// Lazy product handle of the [`GptEngine`]
#[derive(Debug)]
pub struct GptProduct {
    nodes: Vec<GraphNode>,
    head: String,
    materialized: OnceCell<PathBuf>,
}

impl GptProduct {
    /// Id of the node producing this product
    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    fn head_operator(&self) -> &str {
        self.nodes
            .iter()
            .find(|node| node.id == self.head)
            .map_or("Read", |node| node.operator.as_str())
    }

    /// BEAM-DIMAP header written for this product, if any
    pub fn materialized(&self) -> Option<&Path> {
        self.materialized.get().map(PathBuf::as_path)
    }
}

impl Product for GptProduct {
    fn release(self) -> Result<(), EngineError> {
        match self.materialized.into_inner() {
            Some(dim) => remove_dimap(&dim),
            None => Ok(()),
        }
    }

    fn node_id(&self) -> Option<&str> {
        Some(&self.head)
    }
}

fn remove_dimap(dim: &Path) -> Result<(), EngineError> {
    let data_dir = dim.with_extension("data");
    if dim.exists() {
        fs::remove_file(dim)
            .map_err(|e| EngineError::Release(format!("{}: {}", dim.display(), e)))?;
    }
    if data_dir.exists() {
        fs::remove_dir_all(&data_dir)
            .map_err(|e| EngineError::Release(format!("{}: {}", data_dir.display(), e)))?;
    }
    Ok(())
}

/// Transform engine backed by the SNAP `gpt` executable
pub struct GptEngine {
    settings: GptSettings,
    workspace: TempDir,
    next_id: AtomicUsize,
    log: RunLogger,
}

impl GptEngine {
    pub fn new(settings: GptSettings, log: RunLogger) -> Result<Self, EngineError> {
        let workspace = tempfile::Builder::new().prefix("sarflow-").tempdir()?;
        log.debug(format_args!("gpt workspace: {}", workspace.path().display()));
        Ok(Self {
            settings,
            workspace,
            next_id: AtomicUsize::new(0),
            log,
        })
    }

    /// Scratch directory holding graphs and materialized products
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    fn next(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn node_id(&self, operator: &str) -> String {
        format!("{}-{}", operator, self.next())
    }

    /// Nodes needed to produce `product`, and the id of its last node
    fn lineage(&self, product: &GptProduct) -> (Vec<GraphNode>, String) {
        match product.materialized.get() {
            Some(dim) => {
                let node = GraphNode::read(self.node_id("Read"), dim);
                let head = node.id.clone();
                (vec![node], head)
            }
            None => (product.nodes.clone(), product.head.clone()),
        }
    }

    fn execute(&self, nodes: &[GraphNode], label: &str) -> Result<(), EngineError> {
        let graph = render_graph(nodes)?;
        let graph_path = self.workspace.path().join(format!("graph-{}.xml", self.next()));
        fs::write(&graph_path, graph)?;

        let executable = &self.settings.executable;
        self.log.debug(format_args!(
            "Running {} {} ({} nodes)",
            executable.display(),
            graph_path.display(),
            nodes.len()
        ));

        let start = Instant::now();
        let output = Command::new(executable)
            .arg(&graph_path)
            .args(&self.settings.extra_args)
            .output()
            .map_err(|e| EngineError::Operator {
                operator: label.to_string(),
                message: format!("cannot launch {}: {}", executable.display(), e),
            })?;

        if !output.status.success() {
            let stderr = output_tail(&output.stderr);
            let detail = if stderr.is_empty() {
                output_tail(&output.stdout)
            } else {
                stderr
            };
            let message = format!("gpt exited with {}: {}", output.status, detail);

            let failed = [&output.stderr, &output.stdout].into_iter().find_map(|stream| {
                let text = String::from_utf8_lossy(stream);
                let id = failing_node(&text)?;
                nodes.iter().find(|node| node.id == id)
            });
            return Err(match failed {
                Some(node) => EngineError::Node {
                    node: node.id.clone(),
                    operator: node.operator.clone(),
                    message,
                },
                None => EngineError::Operator {
                    operator: label.to_string(),
                    message,
                },
            });
        }

        self.log.info(format_args!(
            "gpt completed {} in {:.1}s",
            label,
            start.elapsed().as_secs_f64()
        ));
        Ok(())
    }
}

impl TransformEngine for GptEngine {
    type Product = GptProduct;

    fn read_product(&self, path: &Path) -> Result<GptProduct, EngineError> {
        if !path.exists() {
            return Err(EngineError::Read {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }
        let node = GraphNode::read(self.node_id("Read"), path);
        Ok(GptProduct {
            head: node.id.clone(),
            nodes: vec![node],
            materialized: OnceCell::new(),
        })
    }

    fn apply(
        &self,
        operator: &str,
        params: &StageParams,
        inputs: StageInputs<&GptProduct>,
    ) -> Result<GptProduct, EngineError> {
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut sources = Vec::new();

        let mut attach = |element: &str, product: &GptProduct| {
            let (lineage, head) = self.lineage(product);
            for node in lineage {
                if !nodes.iter().any(|n| n.id == node.id) {
                    nodes.push(node);
                }
            }
            sources.push((element.to_string(), head));
        };

        match inputs {
            StageInputs::Single(product) => attach("sourceProduct", product),
            StageInputs::Named(named) => {
                for (name, product) in named {
                    attach(name, product);
                }
            }
        }

        let node = GraphNode {
            id: self.node_id(operator),
            operator: operator.to_string(),
            sources,
            parameters: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        };
        let head = node.id.clone();
        nodes.push(node);

        Ok(GptProduct {
            nodes,
            head,
            materialized: OnceCell::new(),
        })
    }

    fn write_product(&self, product: &GptProduct, path: &Path, format: &str) -> Result<(), EngineError> {
        let (mut nodes, head) = self.lineage(product);
        let write = GraphNode::write(self.node_id("Write"), &head, path, format);
        let write_id = write.id.clone();
        nodes.push(write);

        // Failures traced to an upstream node belong to the stage that made it
        self.execute(&nodes, "Write").map_err(|e| {
            if e.node().map_or(false, |node| node != write_id) {
                e
            } else {
                EngineError::Write {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn band_names(&self, product: &GptProduct) -> Result<Vec<String>, EngineError> {
        if let Some(dim) = product.materialized.get() {
            return read_dim_band_names(dim);
        }

        let dim = self.workspace.path().join(format!("{}.dim", product.head));
        let mut nodes = product.nodes.clone();
        nodes.push(GraphNode::write(self.node_id("Write"), &product.head, &dim, DIMAP_FORMAT));
        self.execute(&nodes, product.head_operator())?;

        let names = read_dim_band_names(&dim)?;
        // A product is materialized at most once, so the cell is still empty here
        let _ = product.materialized.set(dim);
        Ok(names)
    }
}

fn output_tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(OUTPUT_TAIL_LINES);
    lines[start..].join("\n")
}

/// Id of the graph node a gpt error report names, if any
pub fn failing_node(output: &str) -> Option<&str> {
    let start = output.find(NODE_ID_MARKER)? + NODE_ID_MARKER.len();
    let rest = &output[start..];
    let end = rest.find(']')?;
    let id = rest[..end].trim();
    (!id.is_empty()).then_some(id)
}

fn xml_error<E: std::fmt::Display>(e: E) -> EngineError {
    EngineError::Graph(e.to_string())
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), EngineError> {
    writer.write_event(event).map_err(xml_error)?;
    Ok(())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), EngineError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Render nodes as a SNAP processing graph document
pub fn render_graph(nodes: &[GraphNode]) -> Result<String, EngineError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    emit(&mut writer, Event::Start(BytesStart::new("graph").with_attributes([("id", "Graph")])))?;
    text_element(&mut writer, "version", "1.0")?;

    for node in nodes {
        emit(
            &mut writer,
            Event::Start(BytesStart::new("node").with_attributes([("id", node.id.as_str())])),
        )?;
        text_element(&mut writer, "operator", &node.operator)?;

        emit(&mut writer, Event::Start(BytesStart::new("sources")))?;
        for (element, refid) in &node.sources {
            emit(
                &mut writer,
                Event::Empty(BytesStart::new(element.as_str()).with_attributes([("refid", refid.as_str())])),
            )?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("sources")))?;

        emit(&mut writer, Event::Start(BytesStart::new("parameters")))?;
        for (key, value) in &node.parameters {
            text_element(&mut writer, key, value)?;
        }
        emit(&mut writer, Event::End(BytesEnd::new("parameters")))?;

        emit(&mut writer, Event::End(BytesEnd::new("node")))?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("graph")))?;
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn read_dim_band_names(dim: &Path) -> Result<Vec<String>, EngineError> {
    let content = fs::read_to_string(dim).map_err(|e| EngineError::Read {
        path: dim.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_band_names(&content)
}

/// Band names of a BEAM-DIMAP header, in document order
pub fn parse_band_names(xml_content: &str) -> Result<Vec<String>, EngineError> {
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut names = Vec::new();
    let mut in_band_name = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => in_band_name = e.name().as_ref() == b"BAND_NAME",
            Ok(Event::Text(ref e)) if in_band_name => {
                names.push(e.unescape().map_err(xml_error)?.into_owned());
            }
            Ok(Event::End(_)) => in_band_name = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}
