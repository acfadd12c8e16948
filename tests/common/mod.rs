#![allow(dead_code)]

use std::io::Write;

use bzip2::write::BzEncoder;
use tempfile::NamedTempFile;
use xz::write::XzEncoder;

/// Node 1 is a station, way 10 (tagged as a road) joins nodes 1-3 and is a member of the
/// train route relation 100, which also has node 2 as a stop. Everything else is noise.
pub const STATION_DOCUMENT: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<osm version="0.6" generator="test">
 <bounds minlat="51.0" minlon="-1.0" maxlat="52.0" maxlon="0.0"/>
 <node id="1" lat="51.5300000" lon="-0.1230000" version="2" user="mapper">
  <tag k="railway" v="station"/>
  <tag k="name" v="King&apos;s Cross"/>
 </node>
 <node id="2" lat="51.5310000" lon="-0.1240000"/>
 <node id="3" lat="51.5320000" lon="-0.1250000"/>
 <node id="4" lat="51.6000000" lon="-0.2000000"/>
 <node id="5" lat="51.7000000" lon="-0.3000000">
  <tag k="amenity" v="cafe"/>
 </node>
 <way id="10">
  <nd ref="1"/>
  <nd ref="2"/>
  <nd ref="3"/>
  <tag k="highway" v="residential"/>
 </way>
 <way id="11">
  <nd ref="4"/>
  <nd ref="5"/>
  <tag k="highway" v="primary"/>
 </way>
 <relation id="100">
  <member type="way" ref="10" role=""/>
  <member type="node" ref="2" role="stop"/>
  <tag k="route" v="train"/>
 </relation>
 <relation id="101">
  <member type="way" ref="11" role=""/>
  <tag k="route" v="bus"/>
 </relation>
</osm>
"#;

pub const STATION_EXPECTED: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<osm version="0.6" generator="osmrail">
  <node id="1" lat="51.5300000" lon="-0.1230000">
    <tag k="railway" v="station" />
    <tag k="name" v="King&apos;s Cross" />
  </node>
  <node id="2" lat="51.5310000" lon="-0.1240000"/>
  <node id="3" lat="51.5320000" lon="-0.1250000"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <nd ref="3"/>
    <tag k="highway" v="residential" />
  </way>
  <relation id="100">
    <member type="node" ref="2" role="stop"/>
    <member type="way" ref="10" role=""/>
    <tag k="route" v="train" />
  </relation>
</osm>
"#;

pub fn bzip2(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn temp_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// Wraps element lines in a document frame.
pub fn document(body: &str) -> String {
    format!("<?xml version='1.0' encoding='UTF-8'?>\n<osm version=\"0.6\">\n{body}</osm>\n")
}
