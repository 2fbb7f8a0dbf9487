//! GPX export following the openrouteservice GPX schema.
//!
//! Element order matches the schema sequences exactly; elements the schema
//! requires are written even when empty.

use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use crate::config::InfoConfig;
use crate::directions::{RouteQuery, RouteResult, Step};

pub const NAMESPACE: &str = "https://raw.githubusercontent.com/GIScience/openrouteservice-schema/main/gpx/v2/ors-gpx.xsd";

/// Service identity for the metadata block
pub struct GpxInfo<'a> {
    pub attribution: &'a str,
    pub info: &'a InfoConfig,
}

fn text<W: Write>(w: &mut Writer<W>, tag: &str, value: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(tag)))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn start<W: Write>(w: &mut Writer<W>, tag: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(tag)))?;
    Ok(())
}

fn end<W: Write>(w: &mut Writer<W>, tag: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn empty<W: Write>(w: &mut Writer<W>, tag: &str) -> Result<()> {
    w.write_event(Event::Empty(BytesStart::new(tag)))?;
    Ok(())
}

fn bounds<W: Write>(w: &mut Writer<W>, bbox: &[f64]) -> Result<()> {
    let mut el = BytesStart::new("bounds");
    if bbox.len() >= 4 {
        let half = bbox.len() / 2;
        el.push_attribute(("minLat", bbox[1].to_string().as_str()));
        el.push_attribute(("minLon", bbox[0].to_string().as_str()));
        el.push_attribute(("maxLat", bbox[half + 1].to_string().as_str()));
        el.push_attribute(("maxLon", bbox[half].to_string().as_str()));
    } else {
        for name in ["minLat", "minLon", "maxLat", "maxLon"] {
            el.push_attribute((name, "0"));
        }
    }
    w.write_event(Event::Empty(el))?;
    Ok(())
}

fn write_metadata<W: Write>(w: &mut Writer<W>, routes: &[RouteResult], gpx: &GpxInfo) -> Result<()> {
    let info = gpx.info;
    start(w, "metadata")?;
    text(w, "name", &info.routing_name)?;
    text(w, "desc", &info.routing_description)?;

    start(w, "author")?;
    text(w, "name", &info.author_tag)?;
    let mut email = BytesStart::new("email");
    let (id, domain) = info.support_mail.split_once('@').unwrap_or(("", ""));
    email.push_attribute(("id", id));
    email.push_attribute(("domain", format!("@{domain}").as_str()));
    w.write_event(Event::Empty(email))?;
    let mut link = BytesStart::new("link");
    link.push_attribute(("href", info.base_url.as_str()));
    w.write_event(Event::Start(link))?;
    text(w, "text", &info.base_url)?;
    text(w, "type", "text/html")?;
    end(w, "link")?;
    end(w, "author")?;

    let mut copyright = BytesStart::new("copyright");
    copyright.push_attribute(("author", gpx.attribution));
    w.write_event(Event::Start(copyright))?;
    text(w, "year", &chrono::Utc::now().format("%Y").to_string())?;
    text(w, "license", &info.content_licence)?;
    end(w, "copyright")?;

    text(w, "time", &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true))?;
    // The document box is the first route's, like the route summaries
    bounds(w, routes.first().map_or(&[][..], |r| r.bbox.as_slice()))?;
    start(w, "extensions")?;
    text(w, "system-message", &info.system_message)?;
    end(w, "extensions")?;
    end(w, "metadata")
}

/// Step covering each geometry point; a shared boundary point belongs to the earlier step.
fn steps_per_point(route: &RouteResult) -> Vec<Option<&Step>> {
    let mut out: Vec<Option<&Step>> = vec![None; route.geometry.len()];
    for step in route.segments.iter().flat_map(|s| &s.steps) {
        let [from, to] = step.way_points;
        for slot in out.iter_mut().take(to + 1).skip(from) {
            if slot.is_none() {
                *slot = Some(step);
            }
        }
    }
    out
}

fn write_route<W: Write>(w: &mut Writer<W>, route: &RouteResult, query: &RouteQuery) -> Result<()> {
    start(w, "rte")?;

    let steps = if query.instructions {
        steps_per_point(route)
    } else {
        vec![None; route.geometry.len()]
    };
    for (i, p) in route.geometry.iter().enumerate() {
        let mut el = BytesStart::new("rtept");
        el.push_attribute(("lat", p[1].to_string().as_str()));
        el.push_attribute(("lon", p[0].to_string().as_str()));
        w.write_event(Event::Start(el))?;
        if let Some(ele) = p.get(2) {
            text(w, "ele", &ele.to_string())?;
        }
        match steps[i] {
            Some(step) => {
                text(w, "name", &step.name)?;
                text(w, "desc", &step.instruction)?;
                start(w, "extensions")?;
                text(w, "distance", &step.distance.to_string())?;
                text(w, "duration", &step.duration.to_string())?;
                text(w, "type", &step.step_type.to_string())?;
                text(w, "step", &i.to_string())?;
                end(w, "extensions")?;
            }
            None => {
                empty(w, "name")?;
                empty(w, "desc")?;
                empty(w, "extensions")?;
            }
        }
        end(w, "rtept")?;
    }

    let summary = &route.summary;
    start(w, "extensions")?;
    text(w, "distance", &summary.distance.to_string())?;
    text(w, "duration", &summary.duration.to_string())?;
    let actual: f64 = route.segments.iter().filter(|s| s.duration > 0.0).map(|s| s.distance).sum();
    text(w, "distanceActual", &actual.to_string())?;
    text(w, "ascent", &summary.ascent.unwrap_or(0.0).to_string())?;
    text(w, "descent", &summary.descent.unwrap_or(0.0).to_string())?;
    let avgspeed = if summary.duration > 0.0 {
        let metres = summary.distance / query.units.factor();
        query.units.speed(metres / summary.duration)
    } else {
        0.0
    };
    text(w, "avgspeed", &avgspeed.to_string())?;
    bounds(w, &route.bbox)?;
    end(w, "extensions")?;
    end(w, "rte")
}

/// Serialize `routes` as a GPX document.
pub fn directions(routes: &[RouteResult], query: &RouteQuery, gpx: &GpxInfo) -> Result<String> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("gpx");
    root.push_attribute(("version", "1.0"));
    root.push_attribute(("creator", gpx.info.author_tag.as_str()));
    root.push_attribute(("xmlns", NAMESPACE));
    w.write_event(Event::Start(root))?;

    write_metadata(&mut w, routes, gpx)?;
    for route in routes {
        write_route(&mut w, route, query)?;
    }

    start(&mut w, "extensions")?;
    text(&mut w, "attribution", gpx.attribution)?;
    text(&mut w, "engine", crate::ENGINE_VERSION)?;
    text(&mut w, "build_date", crate::build_date())?;
    text(&mut w, "profile", query.profile.name())?;
    text(&mut w, "preference", query.preference.name())?;
    text(&mut w, "language", query.language.code())?;
    text(&mut w, "distance-units", query.units.name())?;
    text(&mut w, "instructions", &query.instructions.to_string())?;
    text(&mut w, "elevation", &query.elevation.to_string())?;
    end(&mut w, "extensions")?;

    end(&mut w, "gpx")?;
    Ok(String::from_utf8(w.into_inner())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingLimits;
    use crate::directions::{self, DirectionsRequest};
    use crate::formats::ResponseFormat;
    use crate::graph::RouteGraph;
    use crate::parse::OsmData;
    use crate::profiles::Profile;
    use crate::snap::SpatialIndex;
    use quick_xml::Reader;

    /// `extensionsType` children in schema order
    const EXTENSIONS: [&str; 19] = [
        "distance",
        "duration",
        "type",
        "step",
        "distanceActual",
        "ascent",
        "descent",
        "avgspeed",
        "attribution",
        "engine",
        "build_date",
        "profile",
        "preference",
        "language",
        "distance-units",
        "instructions",
        "elevation",
        "bounds",
        "system-message",
    ];

    #[derive(Debug, Default)]
    struct Element {
        name: String,
        attributes: Vec<(String, String)>,
        text: String,
        children: Vec<Element>,
    }

    impl Element {
        fn names(&self) -> Vec<&str> {
            self.children.iter().map(|c| c.name.as_str()).collect()
        }

        fn child(&self, name: &str) -> &Element {
            self.children.iter().find(|c| c.name == name).unwrap()
        }

        fn attribute(&self, name: &str) -> Option<&str> {
            self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
        }
    }

    fn element(e: &BytesStart) -> Element {
        Element {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            attributes: e
                .attributes()
                .map(|a| {
                    let a = a.unwrap();
                    (
                        String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                        a.unescape_value().unwrap().into_owned(),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    fn parse_tree(xml: &str) -> Element {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut stack = vec![Element::default()];
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) => stack.push(element(&e)),
                Event::Empty(e) => {
                    let el = element(&e);
                    stack.last_mut().unwrap().children.push(el);
                }
                Event::Text(t) => stack.last_mut().unwrap().text.push_str(&String::from_utf8_lossy(t.as_ref())),
                Event::End(_) => {
                    let done = stack.pop().unwrap();
                    stack.last_mut().unwrap().children.push(done);
                }
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(stack.len(), 1, "unbalanced document");
        stack.pop().unwrap().children.pop().unwrap()
    }

    fn assert_extensions_order(ext: &Element) {
        let mut pos = 0;
        for name in ext.names() {
            let found = EXTENSIONS[pos..].iter().position(|n| *n == name);
            assert!(found.is_some(), "<{name}> out of order or not allowed in extensions");
            pos += found.unwrap() + 1;
        }
    }

    fn gpx(instructions: bool) -> (String, usize) {
        let mut data = OsmData::default();
        data.add_node(1, 8.000, 49.000);
        data.add_node(2, 8.010, 49.000);
        data.add_node(3, 8.010, 49.010);
        data.add_way(1, &[1, 2], &[("highway", "residential"), ("name", "Rue <A> & B")]);
        data.add_way(2, &[2, 3], &[("highway", "residential"), ("name", "Hauptstrasse")]);
        let g = RouteGraph::from_osm(&data, &[Profile::DrivingCar]).unwrap();
        let idx = SpatialIndex::build(&g);
        let req: DirectionsRequest = serde_json::from_value(serde_json::json!({
            "coordinates": [[8.001, 49.0], [8.01, 49.009]],
            "instructions": instructions
        }))
        .unwrap();
        let q = directions::request::validate(&req, Profile::DrivingCar, ResponseFormat::Gpx, &RoutingLimits::default())
            .unwrap();
        let routes = directions::compute(&g, &idx, &q).unwrap();
        let info = InfoConfig::default();
        let meta = GpxInfo {
            attribution: "© OpenStreetMap contributors",
            info: &info,
        };
        (directions(&routes, &q, &meta).unwrap(), routes[0].geometry.len())
    }

    #[test]
    fn test_gpx_escapes_names() {
        let (xml, _) = gpx(true);
        assert!(xml.contains("&lt;A&gt; &amp; B"));
    }

    #[test]
    fn test_gpx_follows_schema_sequences() {
        for instructions in [true, false] {
            let (xml, points) = gpx(instructions);
            let root = parse_tree(&xml);
            assert_eq!(root.name, "gpx");
            assert_eq!(root.attribute("xmlns"), Some(NAMESPACE));
            assert_eq!(root.names(), ["metadata", "rte", "extensions"]);

            let metadata = root.child("metadata");
            assert_eq!(
                metadata.names(),
                ["name", "desc", "author", "copyright", "time", "bounds", "extensions"]
            );
            assert_eq!(metadata.child("name").text, "ORSRouting");
            let author = metadata.child("author");
            assert_eq!(author.names(), ["name", "email", "link"]);
            assert_eq!(author.child("email").attribute("domain"), Some("@openrouteservice.org"));
            assert_eq!(author.child("link").names(), ["text", "type"]);
            assert_eq!(metadata.child("copyright").names(), ["year", "license"]);
            assert_eq!(metadata.child("extensions").names(), ["system-message"]);

            let rte = root.child("rte");
            let names = rte.names();
            assert_eq!(names.len(), points + 1);
            assert!(names[..points].iter().all(|n| *n == "rtept"));
            assert_eq!(names[points], "extensions");
            for rtept in &rte.children[..points] {
                assert!(rtept.attribute("lat").is_some() && rtept.attribute("lon").is_some());
                assert_eq!(rtept.names(), ["name", "desc", "extensions"]);
                assert_extensions_order(rtept.child("extensions"));
            }
            let described = rte.children[..points].iter().filter(|p| !p.child("desc").text.is_empty()).count();
            if instructions {
                assert_eq!(described, points);
            } else {
                assert_eq!(described, 0);
            }

            let rte_ext = rte.child("extensions");
            assert_extensions_order(rte_ext);
            for name in ["distance", "duration", "ascent", "descent", "avgspeed", "bounds"] {
                assert!(rte_ext.names().contains(&name), "route extensions lack <{name}>");
            }

            let ext = root.child("extensions");
            assert_extensions_order(ext);
            assert_eq!(
                ext.names(),
                [
                    "attribution",
                    "engine",
                    "build_date",
                    "profile",
                    "preference",
                    "language",
                    "distance-units",
                    "instructions",
                    "elevation"
                ]
            );
        }
    }
}
