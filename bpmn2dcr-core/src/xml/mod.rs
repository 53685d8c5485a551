pub mod dcr_xml;
