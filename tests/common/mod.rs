use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

pub const ORDER_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:o="urn:orders"
           targetNamespace="urn:orders"
           elementFormDefault="qualified">
    <xs:element name="order" type="o:OrderType"/>
</xs:schema>"#;

pub const ORDER_TYPES_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns:o="urn:orders"
           targetNamespace="urn:orders"
           elementFormDefault="qualified">
    <xs:complexType name="OrderType">
        <xs:sequence>
            <xs:element name="id" type="xs:int"/>
            <xs:element name="lines">
                <xs:complexType>
                    <xs:sequence>
                        <xs:element name="line" type="xs:string" maxOccurs="unbounded"/>
                    </xs:sequence>
                </xs:complexType>
            </xs:element>
        </xs:sequence>
    </xs:complexType>
</xs:schema>"#;

pub const ORDER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- order export -->
<o:order xmlns:o="urn:orders">
    <o:id>7</o:id>
    <o:lines>
        <o:line>tea</o:line>
        <o:line>milk</o:line>
    </o:lines>
</o:order>"#;

/// Schema and document files laid out the way a host application would
/// keep them on disk
pub struct OrderFixtures {
    pub dir: TempDir,
}

impl OrderFixtures {
    pub fn new() -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("order.xsd"), ORDER_XSD)?;
        fs::write(dir.path().join("order-types.xsd"), ORDER_TYPES_XSD)?;
        fs::write(dir.path().join("order.xml"), ORDER_XML)?;
        Ok(Self { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
