//! FGD DEM GML documents for tests.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub struct GmlTile<'a> {
    pub mesh: Option<&'a str>,
    /// (lat, lon)
    pub lower: (f64, f64),
    /// (lat, lon)
    pub upper: (f64, f64),
    /// (x, y) of the last grid index.
    pub high: (usize, usize),
    pub records: &'a [&'a str],
}

impl Default for GmlTile<'static> {
    fn default() -> Self {
        Self {
            mesh: Some("53394525"),
            lower: (35.0, 139.0),
            upper: (35.5, 139.5),
            high: (1, 1),
            records: &["地表面,1", "地表面,2", "地表面,3", "地表面,4"],
        }
    }
}

pub fn gml(tile: &GmlTile<'_>) -> String {
    let mut records = String::new();
    for r in tile.records {
        let _ = writeln!(records, "{r}");
    }
    let mesh = tile
        .mesh
        .map(|m| format!("<mesh>{m}</mesh>"))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Dataset xmlns="http://fgd.gsi.go.jp/spec/2008/FGD_GMLSchema" xmlns:gml="http://www.opengis.net/gml/3.2">
<gml:description>基盤地図情報メタデータ ID=fmdid:15-3101</gml:description>
<DEM gml:id="DEM001">
<fid>fgoid:10-00100-15-60101-53394525</fid>
<type>5mメッシュ（標高）</type>
{mesh}
<coverage gml:id="DEM001-3">
<gml:boundedBy>
<gml:Envelope srsName="fguuid:jgd2011.bl">
<gml:lowerCorner>{} {}</gml:lowerCorner>
<gml:upperCorner>{} {}</gml:upperCorner>
</gml:Envelope>
</gml:boundedBy>
<gml:gridDomain>
<gml:Grid dimension="2" gml:id="DEM001-4">
<gml:limits>
<gml:GridEnvelope>
<gml:low>0 0</gml:low>
<gml:high>{} {}</gml:high>
</gml:GridEnvelope>
</gml:limits>
<gml:axisLabels>x y</gml:axisLabels>
</gml:Grid>
</gml:gridDomain>
<gml:rangeSet>
<gml:DataBlock>
<gml:rangeParameters><gml:QuantityList uom="DEM構成点"/></gml:rangeParameters>
<gml:tupleList>
{records}</gml:tupleList>
</gml:DataBlock>
</gml:rangeSet>
<gml:coverageFunction>
<gml:GridFunction>
<gml:sequenceRule order="+x-y">Linear</gml:sequenceRule>
<gml:startPoint>0 0</gml:startPoint>
</gml:GridFunction>
</gml:coverageFunction>
</coverage>
</DEM>
</Dataset>
"#,
        tile.lower.0, tile.lower.1, tile.upper.0, tile.upper.1, tile.high.0, tile.high.1,
    )
}

pub fn write_tile(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
