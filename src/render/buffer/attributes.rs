//! Typed per-cell attribute buffers consumed by the point shader

/// Texture ordinal telling the shader to sample the LOD texture.
pub const LOD_TEXTURE_SENTINEL: i32 = -1;

/// Shader-visible per-cell attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Position,
    Target,
    Size,
    TextureIndex,
    Offset,
    Color,
    Opacity,
    Selected,
    ClusterSelected,
}

impl Attribute {
    pub const ALL: [Attribute; 9] = [
        Attribute::Position,
        Attribute::Target,
        Attribute::Size,
        Attribute::TextureIndex,
        Attribute::Offset,
        Attribute::Color,
        Attribute::Opacity,
        Attribute::Selected,
        Attribute::ClusterSelected,
    ];

    /// Name the shader declares the attribute under
    pub fn name(self) -> &'static str {
        match self {
            Attribute::Position => "position",
            Attribute::Target => "target",
            Attribute::Size => "size",
            Attribute::TextureIndex => "textureIndex",
            Attribute::Offset => "offset",
            Attribute::Color => "color",
            Attribute::Opacity => "opacity",
            Attribute::Selected => "selected",
            Attribute::ClusterSelected => "clusterSelected",
        }
    }

    /// Scalar components per cell
    pub fn components(self) -> usize {
        match self {
            Attribute::Position | Attribute::Target => 3,
            Attribute::Size | Attribute::Offset => 2,
            Attribute::Color => 4,
            Attribute::TextureIndex
            | Attribute::Opacity
            | Attribute::Selected
            | Attribute::ClusterSelected => 1,
        }
    }

    /// Vertex format of one cell's value
    pub fn vertex_format(self) -> wgpu::VertexFormat {
        match self {
            Attribute::Position | Attribute::Target => wgpu::VertexFormat::Float32x3,
            Attribute::Size | Attribute::Offset => wgpu::VertexFormat::Float32x2,
            Attribute::TextureIndex => wgpu::VertexFormat::Sint32,
            Attribute::Color => wgpu::VertexFormat::Unorm8x4,
            Attribute::Opacity | Attribute::Selected | Attribute::ClusterSelected => {
                wgpu::VertexFormat::Float32
            }
        }
    }

    pub(crate) fn bit(self) -> u16 {
        1 << self as u16
    }
}

#[derive(Clone, Debug)]
enum AttributeData {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Byte(Vec<u8>),
}

/// Fixed-length buffer holding one attribute for every cell of a draw call.
///
/// The length is set at construction and never changes; writes replace the
/// values of a single cell slot.
#[derive(Clone, Debug)]
pub struct AttributeBuffer {
    attribute: Attribute,
    data: AttributeData,
}

impl AttributeBuffer {
    /// Allocate a buffer for `cells` cells filled with the attribute's default
    pub fn new(attribute: Attribute, cells: usize) -> Self {
        let n = cells * attribute.components();
        let data = match attribute.vertex_format() {
            wgpu::VertexFormat::Sint32 => AttributeData::Int(vec![0; n]),
            wgpu::VertexFormat::Unorm8x4 => AttributeData::Byte(vec![0; n]),
            _ if attribute == Attribute::Opacity => AttributeData::Float(vec![1.0; n]),
            _ => AttributeData::Float(vec![0.0; n]),
        };
        Self { attribute, data }
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    /// Number of cell slots
    pub fn len(&self) -> usize {
        let total = match &self.data {
            AttributeData::Float(v) => v.len(),
            AttributeData::Int(v) => v.len(),
            AttributeData::Byte(v) => v.len(),
        };
        total / self.attribute.components()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes as uploaded to the GPU
    pub fn as_bytes(&self) -> &[u8] {
        match &self.data {
            AttributeData::Float(v) => bytemuck::cast_slice(v),
            AttributeData::Int(v) => bytemuck::cast_slice(v),
            AttributeData::Byte(v) => v,
        }
    }

    /// Bytes of a single cell slot
    pub fn slot_bytes(&self, slot: usize) -> &[u8] {
        let width = self.attribute.vertex_format().size() as usize;
        &self.as_bytes()[slot * width..(slot + 1) * width]
    }

    fn range(&self, slot: usize) -> std::ops::Range<usize> {
        let c = self.attribute.components();
        slot * c..(slot + 1) * c
    }

    pub fn write_f32(&mut self, slot: usize, values: &[f32]) {
        let range = self.range(slot);
        match &mut self.data {
            AttributeData::Float(v) => v[range].copy_from_slice(values),
            _ => log::error!("{} is not a float attribute", self.attribute.name()),
        }
    }

    pub fn write_i32(&mut self, slot: usize, values: &[i32]) {
        let range = self.range(slot);
        match &mut self.data {
            AttributeData::Int(v) => v[range].copy_from_slice(values),
            _ => log::error!("{} is not an integer attribute", self.attribute.name()),
        }
    }

    pub fn write_u8(&mut self, slot: usize, values: &[u8]) {
        let range = self.range(slot);
        match &mut self.data {
            AttributeData::Byte(v) => v[range].copy_from_slice(values),
            _ => log::error!("{} is not a byte attribute", self.attribute.name()),
        }
    }
}
